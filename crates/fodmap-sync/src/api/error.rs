//! Classification API error types.

use thiserror::Error;

/// Errors from calls to the remote classification service.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The base endpoint is not configured; no call was attempted.
    #[error("Classification API endpoint is not configured")]
    NotConfigured,

    /// Submission was invoked with an empty record list.
    #[error("Cannot submit an empty record batch")]
    EmptyBatch,

    /// Connection, DNS, or timeout failure before a response arrived.
    #[error("Classification API request failed: {0}")]
    Network(String),

    /// The service answered with a non-2xx status.
    #[error("Classification API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Failed to decode classification API response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

impl ApiError {
    /// Returns true if the error is likely transient and the request can
    /// be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Status { .. })
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
