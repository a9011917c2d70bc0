use thiserror::Error;

/// Result type for jobwatch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while driving a job.
#[derive(Debug, Error)]
pub enum WatchError {
    /// HTTP transport failure (timeout, refused connection, protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The relay answered with a non-success status
    #[error("unexpected status {status} from relay: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
