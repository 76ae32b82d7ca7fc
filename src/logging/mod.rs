//! Structured logging helpers
//!
//! Filter construction from `[logging]` and the correlation ID attached to
//! every dispatched request.

use crate::config::LoggingConfig;
use uuid::Uuid;

/// Header carrying the correlation ID to the backend.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build an `EnvFilter` directive string from the logging section.
///
/// The base level comes first, then one `fulcrum::<component>=<level>`
/// directive per override in component order.
///
/// # Examples
///
/// ```
/// use fulcrum::config::LoggingConfig;
/// use fulcrum::logging::build_filter_directives;
///
/// let mut config = LoggingConfig::default();
/// config.component_levels.insert("health".to_string(), "debug".to_string());
///
/// assert_eq!(build_filter_directives(&config), "info,fulcrum::health=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    std::iter::once(config.level.clone())
        .chain(
            config
                .component_levels
                .iter()
                .map(|(component, level)| format!("fulcrum::{component}={level}")),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// Fresh correlation ID for a request that arrived without one.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
