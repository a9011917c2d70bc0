use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde_json::json;
use thiserror::Error as ThisError;

/// Every failure a relay handler can produce.
///
/// `IntoResponse` below is the single translation from errors to HTTP
/// outcomes: upstream application errors are replayed byte-for-byte,
/// transport failures become the fixed 502 envelope, and local validation
/// failures become a 400. Handlers can only answer through this type, so
/// every request gets a response and internal details never leak.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data, caught before any upstream call
    #[error("{message}")]
    BadRequest { message: String },

    /// The backend answered with a structured non-2xx response
    #[error("backend returned status {status}")]
    UpstreamStatus {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// Transport-level failure reaching the backend (timeout, refused
    /// connection, protocol error)
    #[error("backend unreachable: {detail}")]
    UpstreamUnreachable { detail: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// Classify a reqwest failure as a transport error.
    pub fn unreachable(err: reqwest::Error) -> Self {
        Error::UpstreamUnreachable {
            detail: err.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::UpstreamStatus { status, .. } => *status,
            Error::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::UpstreamStatus { status, .. } => {
                tracing::info!(status = %status, "Forwarding backend error response");
            }
            Error::UpstreamUnreachable { .. } => {
                tracing::warn!("Backend transport failure: {}", self);
            }
            Error::Other(_) => {
                tracing::error!("Internal relay error: {:#}", self);
            }
        }

        let status = self.status_code();

        match self {
            // Reproduce the backend's status and body exactly so its error
            // taxonomy survives the relay untouched.
            Error::UpstreamStatus {
                status,
                content_type,
                body,
            } => {
                let mut builder = Response::builder().status(status);
                if let Some(content_type) = content_type {
                    builder = builder.header(header::CONTENT_TYPE, content_type);
                }
                builder
                    .body(Body::from(body))
                    .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
            }
            Error::UpstreamUnreachable { detail } => (
                status,
                Json(json!({ "error": "Backend unavailable", "detail": detail })),
            )
                .into_response(),
            Error::BadRequest { message } => {
                (status, Json(json!({ "error": message }))).into_response()
            }
            Error::Other(_) => (
                status,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
        }
    }
}

/// Type alias for relay operation results
pub type Result<T> = std::result::Result<T, Error>;
