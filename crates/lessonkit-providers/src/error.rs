//! Sink error types.

use thiserror::Error;

/// Errors that can occur when talking to a submission backend.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backend returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (missing or invalid token).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The backend does not know the exercise.
    #[error("exercise not found: {0}")]
    ExerciseNotFound(String),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The configured base URL cannot carry exercise paths.
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl SinkError {
    /// Retrying the same request cannot succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            SinkError::AuthenticationFailed(_)
            | SinkError::ExerciseNotFound(_)
            | SinkError::InvalidUrl(_) => true,
            SinkError::ApiError { status, .. } => (400..500).contains(status),
            SinkError::RateLimited { .. } | SinkError::Timeout(_) | SinkError::NetworkError(_) => {
                false
            }
        }
    }
}
