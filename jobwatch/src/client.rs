//! HTTP client abstraction for talking to the relay.
//!
//! This module defines the `RelayApi` trait to abstract the relay's HTTP
//! surface, enabling testability with mock implementations.

use crate::error::{Result, WatchError};
use crate::types::{JobProgress, VideoUpload};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Trait for the relay operations the client-side drivers need.
///
/// This abstraction allows for different implementations (production vs.
/// testing) and makes the polling logic testable without real HTTP calls.
#[async_trait]
pub trait RelayApi: Send + Sync + Clone {
    /// Run a single-frame analysis. The frame is an opaque JSON body
    /// (`{"image_base64": ...}`) and the response is returned undecoded.
    async fn analyze_frame(&self, frame: &serde_json::Value) -> Result<serde_json::Value>;

    /// Submit a video for asynchronous annotation, returning the job
    /// identifier issued by the backend.
    async fn submit_annotate(&self, upload: &VideoUpload) -> Result<String>;

    /// Fetch the current progress snapshot for a job.
    async fn annotate_progress(&self, job_id: &str) -> Result<JobProgress>;

    /// Download the annotated result for a finished job.
    async fn annotate_result(&self, job_id: &str) -> Result<Bytes>;
}

#[derive(Debug, Deserialize)]
struct SubmitReceipt {
    job_id: String,
}

// ============================================================================
// Production implementation using reqwest
// ============================================================================

/// Production relay client over reqwest.
///
/// Timeouts are fixed per operation: submission and frame analysis are short
/// (the work happens out-of-band or is lightweight), progress polls shorter
/// still, and the result download long enough for a full video body.
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    http: reqwest::Client,
    base: Url,
    frame_timeout: Duration,
    submit_timeout: Duration,
    poll_timeout: Duration,
    result_timeout: Duration,
}

impl HttpRelayClient {
    /// Create a client for the relay at `base`.
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            frame_timeout: Duration::from_secs(60),
            submit_timeout: Duration::from_secs(60),
            poll_timeout: Duration::from_secs(10),
            result_timeout: Duration::from_secs(600),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    /// Classify a relay response: success passes through, anything else is
    /// surfaced with its status and body.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(WatchError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RelayApi for HttpRelayClient {
    #[tracing::instrument(skip(self, frame))]
    async fn analyze_frame(&self, frame: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .http
            .post(self.url("/analyze_frame"))
            .timeout(self.frame_timeout)
            .json(frame)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    #[tracing::instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.bytes.len()))]
    async fn submit_annotate(&self, upload: &VideoUpload) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(upload.bytes.to_vec())
            .file_name(upload.filename.clone())
            .mime_str(&upload.content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("save_to_bucket", upload.save_to_bucket.to_string());

        let response = self
            .http
            .post(self.url("/annotate_video_async"))
            .timeout(self.submit_timeout)
            .multipart(form)
            .send()
            .await?;
        let receipt: SubmitReceipt = Self::check(response).await?.json().await?;

        tracing::info!(job_id = %receipt.job_id, "annotation job submitted");
        Ok(receipt.job_id)
    }

    #[tracing::instrument(skip(self))]
    async fn annotate_progress(&self, job_id: &str) -> Result<JobProgress> {
        let response = self
            .http
            .get(self.url(&format!("/annotate_progress/{job_id}")))
            .timeout(self.poll_timeout)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    #[tracing::instrument(skip(self))]
    async fn annotate_result(&self, job_id: &str) -> Result<Bytes> {
        let response = self
            .http
            .get(self.url(&format!("/annotate_result/{job_id}")))
            .timeout(self.result_timeout)
            .send()
            .await?;
        Ok(Self::check(response).await?.bytes().await?)
    }
}

// ============================================================================
// Test/mock implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Record of a call made to the mock relay client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    AnalyzeFrame,
    Submit { filename: String },
    Progress { job_id: String },
    FetchResult { job_id: String },
}

#[derive(Default)]
struct MockInner {
    analyze_responses: Mutex<VecDeque<Result<serde_json::Value>>>,
    submit_responses: Mutex<VecDeque<Result<String>>>,
    progress_responses: Mutex<VecDeque<Result<JobProgress>>>,
    result_responses: Mutex<VecDeque<Result<Bytes>>>,
    default_progress: Mutex<Option<JobProgress>>,
    default_analyze: Mutex<Option<serde_json::Value>>,
    analyze_delay: Mutex<Duration>,
    calls: Mutex<Vec<MockCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Mock relay client for testing.
///
/// Responses are scripted per operation in FIFO order; every call is
/// recorded. The analyze path additionally tracks how many calls are in
/// flight at once so overlap properties can be asserted.
#[derive(Clone, Default)]
pub struct MockRelayClient {
    inner: Arc<MockInner>,
}

impl MockRelayClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_analyze(&self, response: Result<serde_json::Value>) {
        self.inner.analyze_responses.lock().push_back(response);
    }

    pub fn push_submit(&self, response: Result<String>) {
        self.inner.submit_responses.lock().push_back(response);
    }

    pub fn push_progress(&self, response: Result<JobProgress>) {
        self.inner.progress_responses.lock().push_back(response);
    }

    pub fn push_result(&self, response: Result<Bytes>) {
        self.inner.result_responses.lock().push_back(response);
    }

    /// Response returned by every progress poll once the scripted queue is
    /// drained.
    pub fn set_default_progress(&self, progress: JobProgress) {
        *self.inner.default_progress.lock() = Some(progress);
    }

    /// Response returned by every analyze call once the scripted queue is
    /// drained.
    pub fn set_default_analyze(&self, response: serde_json::Value) {
        *self.inner.default_analyze.lock() = Some(response);
    }

    /// Make every analyze call take this long before returning.
    pub fn set_analyze_delay(&self, delay: Duration) {
        *self.inner.analyze_delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.calls.lock().clone()
    }

    pub fn analyze_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::AnalyzeFrame))
    }

    pub fn submit_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Submit { .. }))
    }

    pub fn progress_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Progress { .. }))
    }

    pub fn result_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::FetchResult { .. }))
    }

    /// Highest number of analyze calls that were ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.inner.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: MockCall) {
        self.inner.calls.lock().push(call);
    }
}

#[async_trait]
impl RelayApi for MockRelayClient {
    async fn analyze_frame(&self, _frame: &serde_json::Value) -> Result<serde_json::Value> {
        self.record(MockCall::AnalyzeFrame);

        let current = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.inner.analyze_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(response) = self.inner.analyze_responses.lock().pop_front() {
            return response;
        }
        if let Some(default) = self.inner.default_analyze.lock().clone() {
            return Ok(default);
        }
        Err(WatchError::Internal(
            "no mock response configured for analyze_frame".to_string(),
        ))
    }

    async fn submit_annotate(&self, upload: &VideoUpload) -> Result<String> {
        self.record(MockCall::Submit {
            filename: upload.filename.clone(),
        });
        self.inner
            .submit_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(WatchError::Internal(
                    "no mock response configured for submit_annotate".to_string(),
                ))
            })
    }

    async fn annotate_progress(&self, job_id: &str) -> Result<JobProgress> {
        self.record(MockCall::Progress {
            job_id: job_id.to_string(),
        });
        if let Some(response) = self.inner.progress_responses.lock().pop_front() {
            return response;
        }
        if let Some(default) = self.inner.default_progress.lock().clone() {
            return Ok(default);
        }
        Err(WatchError::Internal(
            "no mock response configured for annotate_progress".to_string(),
        ))
    }

    async fn annotate_result(&self, job_id: &str) -> Result<Bytes> {
        self.record(MockCall::FetchResult {
            job_id: job_id.to_string(),
        });
        self.inner
            .result_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(WatchError::Internal(
                    "no mock response configured for annotate_result".to_string(),
                ))
            })
    }
}
