//! Error types for health checking.

use thiserror::Error;

/// Errors that can occur during health checking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthCheckError {
    /// Request timeout
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Backend answered with a non-2xx status
    #[error("unexpected HTTP status from backend: {0}")]
    HttpError(u16),

    /// The probe request could not be built
    #[error("invalid probe request: {0}")]
    InvalidRequest(String),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
