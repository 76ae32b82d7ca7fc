//! Error types for strategy construction

use thiserror::Error;

/// Errors that can occur while building a selection strategy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The configured strategy name is not one of the known strategies
    #[error("unknown strategy type: {0}")]
    UnknownStrategy(String),
}
