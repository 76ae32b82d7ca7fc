//! Error types for request forwarding

use thiserror::Error;

/// Failures that prevent a response from being obtained from a backend
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The backend did not answer within the client timeout
    #[error("backend timed out: {0}")]
    Timeout(String),

    /// Connection refused, reset, DNS failure and similar
    #[error("connection to backend failed: {0}")]
    Connection(String),

    /// The outgoing request could not be assembled
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

impl ForwardError {
    /// Short label used for the `kind` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Timeout(_) => "timeout",
            ForwardError::Connection(_) => "connection",
            ForwardError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ForwardError::Timeout(e.to_string())
        } else if e.is_builder() {
            ForwardError::InvalidRequest(e.to_string())
        } else {
            ForwardError::Connection(e.to_string())
        }
    }
}
