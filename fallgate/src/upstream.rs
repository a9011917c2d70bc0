//! Forwarding client for the analysis backend.
//!
//! Every relay operation maps to exactly one outbound call. Responses come
//! back in one of two shapes: a buffered [`UpstreamPayload`] that replays
//! the backend's status, content type, and body verbatim, or a checked
//! `reqwest::Response` whose body is piped to the client without buffering.
//! Classification is uniform: a non-success status (with its body) becomes
//! [`Error::UpstreamStatus`], any transport failure becomes
//! [`Error::UpstreamUnreachable`]. Nothing is retried.

use crate::api::models::UploadPayload;
use crate::config::BackendConfig;
use crate::errors::{Error, Result};
use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use reqwest::RequestBuilder;
use reqwest::multipart::{Form, Part};
use url::Url;

/// A fully buffered backend response, replayed to the client as-is.
#[derive(Debug, Clone)]
pub struct UpstreamPayload {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for UpstreamPayload {
    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status);
        if let Some(content_type) = self.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// HTTP client for the analysis backend.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl UpstreamClient {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.as_str().trim_end_matches('/'), path)
    }

    /// GET `/health`, buffered.
    #[tracing::instrument(skip(self))]
    pub async fn health(&self) -> Result<UpstreamPayload> {
        let request = self
            .http
            .get(self.url("/health"))
            .timeout(self.config.status_timeout);
        self.buffered(request).await
    }

    /// POST `/analyze_frame` with the raw JSON body, buffered. The body is
    /// forwarded as received so the backend payload round-trips untouched.
    #[tracing::instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn analyze_frame(&self, body: Bytes) -> Result<UpstreamPayload> {
        let request = self
            .http
            .post(self.url("/analyze_frame"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(self.config.frame_timeout);
        self.buffered(request).await
    }

    /// POST `/analyze_video` as multipart, buffered JSON summary.
    #[tracing::instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.bytes.len()))]
    pub async fn analyze_video(&self, upload: &UploadPayload) -> Result<UpstreamPayload> {
        let request = self
            .http
            .post(self.url("/analyze_video"))
            .multipart(multipart_form(upload)?)
            .timeout(self.config.video_timeout);
        self.buffered(request).await
    }

    /// POST `/annotate_video` as multipart; the annotated video streams back.
    #[tracing::instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.bytes.len()))]
    pub async fn annotate_video_stream(&self, upload: &UploadPayload) -> Result<reqwest::Response> {
        let request = self
            .http
            .post(self.url("/annotate_video"))
            .multipart(multipart_form(upload)?)
            .timeout(self.config.video_timeout);
        self.send(request).await
    }

    /// POST `/annotate_video_async`, buffered `{job_id}` receipt. This only
    /// starts the job, so it uses the short submission timeout.
    #[tracing::instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.bytes.len()))]
    pub async fn submit_annotate(&self, upload: &UploadPayload) -> Result<UpstreamPayload> {
        let request = self
            .http
            .post(self.url("/annotate_video_async"))
            .multipart(multipart_form(upload)?)
            .timeout(self.config.submit_timeout);
        self.buffered(request).await
    }

    /// GET `/annotate_progress/{job_id}`, buffered. Every call is a live
    /// round-trip; progress is never cached here.
    #[tracing::instrument(skip(self))]
    pub async fn annotate_progress(&self, job_id: &str) -> Result<UpstreamPayload> {
        let request = self
            .http
            .get(self.url(&format!("/annotate_progress/{job_id}")))
            .timeout(self.config.status_timeout);
        self.buffered(request).await
    }

    /// GET `/annotate_result/{job_id}`; the video streams back. Whether the
    /// job is actually finished is the backend's business; early calls are
    /// forwarded as-is.
    #[tracing::instrument(skip(self))]
    pub async fn annotate_result_stream(&self, job_id: &str) -> Result<reqwest::Response> {
        let request = self
            .http
            .get(self.url(&format!("/annotate_result/{job_id}")))
            .timeout(self.config.video_timeout);
        self.send(request).await
    }

    /// Send a request and classify the outcome. Success statuses pass the
    /// response through; non-success statuses are read out and surfaced so
    /// the caller replays them verbatim; send failures become 502 material.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(Error::unreachable)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(Error::unreachable)?;
        Err(Error::UpstreamStatus {
            status,
            content_type,
            body,
        })
    }

    async fn buffered(&self, request: RequestBuilder) -> Result<UpstreamPayload> {
        let response = self.send(request).await?;
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(Error::unreachable)?;
        Ok(UpstreamPayload {
            status,
            content_type,
            body,
        })
    }
}

/// Re-encode an upload as the backend's multipart shape: the file part plus
/// the persistence flag.
fn multipart_form(upload: &UploadPayload) -> Result<Form> {
    let part = Part::bytes(upload.bytes.to_vec())
        .file_name(upload.filename.clone())
        .mime_str(&upload.content_type)
        .map_err(|err| Error::bad_request(format!("invalid content type: {err}")))?;
    Ok(Form::new()
        .part("file", part)
        .text("save_to_bucket", upload.save_to_bucket.to_string()))
}
