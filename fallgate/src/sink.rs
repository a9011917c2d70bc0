//! Best-effort object-storage sink for raw uploads.
//!
//! Persistence is strictly advisory: the relay spawns the upload and moves
//! on, and a sink failure is logged and swallowed, never surfaced to the
//! HTTP caller. The S3 client is built lazily on first use (credential
//! resolution is relatively expensive and most requests never opt in), and
//! the one-time initialization is guarded so concurrent first callers cannot
//! double-initialize.

use crate::config::StorageConfig;
use anyhow::Context;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Destination for raw upload bytes.
#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Persist `bytes` under a generated object name, returning that name.
    async fn store(
        &self,
        original_filename: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String>;
}

/// S3-compatible sink using the AWS SDK.
pub struct S3BlobSink {
    config: StorageConfig,
    client: OnceCell<aws_sdk_s3::Client>,
}

impl S3BlobSink {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Get the client, building it on first use. The `OnceCell` guarantees a
    /// single initialization for the lifetime of the process; losers of the
    /// race simply wait for the winner's client.
    async fn client(&self) -> anyhow::Result<&aws_sdk_s3::Client> {
        self.client
            .get_or_try_init(|| async {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(aws_config::Region::new(self.config.region.clone()))
                    .load()
                    .await;

                let mut builder = aws_sdk_s3::config::Builder::from(&shared);
                // Explicit credentials win over the ambient chain resolved above
                match (&self.config.access_key_id, &self.config.secret_access_key) {
                    (Some(key_id), Some(secret)) => {
                        let credentials = aws_sdk_s3::config::Credentials::new(
                            key_id.clone(),
                            secret.clone(),
                            None,
                            None,
                            "fallgate-config",
                        );
                        builder = builder.credentials_provider(credentials);
                    }
                    (None, None) => {}
                    _ => anyhow::bail!(
                        "storage config requires both access_key_id and secret_access_key when either is set"
                    ),
                }
                if let Some(endpoint_url) = &self.config.endpoint_url {
                    builder = builder.endpoint_url(endpoint_url);
                }
                if self.config.force_path_style {
                    builder = builder.force_path_style(true);
                }

                tracing::info!(
                    bucket = %self.config.bucket,
                    region = %self.config.region,
                    "object-storage sink initialized"
                );
                Ok(aws_sdk_s3::Client::from_conf(builder.build()))
            })
            .await
    }
}

#[async_trait]
impl BlobSink for S3BlobSink {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(
        &self,
        original_filename: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String> {
        let client = self.client().await?;
        let object = object_name(original_filename, Utc::now());

        client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .context("failed to upload object to bucket")?;

        tracing::debug!(object = %object, "object uploaded");
        Ok(object)
    }
}

/// Spawn a fire-and-forget persistence attempt. The principal request path
/// never waits on this, and failure only produces a warning.
pub fn spawn_store(
    sink: Arc<dyn BlobSink>,
    filename: String,
    bytes: Bytes,
    content_type: String,
) {
    tokio::spawn(async move {
        match sink.store(&filename, bytes, &content_type).await {
            Ok(object) => {
                tracing::info!(object = %object, "stored raw upload in bucket");
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    filename = %filename,
                    "bucket upload failed, continuing without persistence"
                );
            }
        }
    });
}

/// Generate a collision-resistant object name from the upload instant and a
/// sanitized original filename. Sanitization keeps `[A-Za-z0-9._-]` and then
/// collapses `..` runs, so the result can never contain `/` or a traversal
/// sequence.
pub fn object_name(original: &str, now: DateTime<Utc>) -> String {
    let mut sanitized: String = original
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }
    let sanitized = sanitized.trim_matches('.');
    let sanitized = if sanitized.is_empty() {
        "upload"
    } else {
        sanitized
    };

    format!("{}_{}", now.format("%Y%m%dT%H%M%S%.3f"), sanitized)
}
