//! Wire types shared between the relay and the polling client.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Lifecycle state reported by the annotation backend for a job.
///
/// `Done` and `Error` are terminal; a job reaches a terminal state exactly
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// Progress snapshot for a job, as returned by `/annotate_progress/{job_id}`.
///
/// Field names mirror the backend's JSON verbatim. `percent` is only present
/// when the backend knows the total frame count; it is surfaced as-is, never
/// recomputed or clamped here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub status: JobStatus,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A video to submit for annotation.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    /// Ask the relay to additionally persist the raw upload to object
    /// storage (advisory; has no effect on the annotation itself).
    pub save_to_bucket: bool,
}

impl VideoUpload {
    pub fn new(bytes: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            content_type: "video/mp4".to_string(),
            save_to_bucket: false,
        }
    }

    pub fn with_persistence(mut self, save_to_bucket: bool) -> Self {
        self.save_to_bucket = save_to_bucket;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_deserializes_backend_shape() {
        let progress: JobProgress = serde_json::from_str(
            r#"{"status": "processing", "processed": 40, "total": 100, "percent": 40.0, "error": null}"#,
        )
        .unwrap();
        assert_eq!(progress.status, JobStatus::Processing);
        assert_eq!(progress.processed, 40);
        assert_eq!(progress.total, Some(100));
        assert_eq!(progress.percent, Some(40.0));
        assert!(progress.error.is_none());
        assert!(!progress.status.is_terminal());
    }

    #[test]
    fn test_progress_tolerates_missing_fields() {
        let progress: JobProgress = serde_json::from_str(r#"{"status": "pending"}"#).unwrap();
        assert_eq!(progress.status, JobStatus::Pending);
        assert_eq!(progress.processed, 0);
        assert!(progress.total.is_none());
        assert!(progress.percent.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
