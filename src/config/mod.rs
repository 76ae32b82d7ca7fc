//! Configuration module for Fulcrum
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`FULCRUM_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use fulcrum::config::FulcrumConfig;
//!
//! let config = FulcrumConfig::default();
//! assert_eq!(config.server.port, 8080);
//!
//! let toml = r#"
//! [load_balancer]
//! strategy = "least-connections"
//!
//! [[backends]]
//! url = "http://127.0.0.1:9001"
//! weight = 2
//! "#;
//! let config: FulcrumConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.backends[0].weight, 2);
//! assert!(config.validate().is_ok());
//! ```

pub mod backend;
pub mod error;
pub mod load_balancer;
pub mod logging;
pub mod server;

pub use backend::BackendConfig;
pub use error::ConfigError;
pub use load_balancer::LoadBalancerConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;

// Re-export HealthCheckConfig from health module
pub use crate::health::HealthCheckConfig;

use crate::routing::StrategyKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the load balancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FulcrumConfig {
    /// Listener settings
    pub server: ServerConfig,
    /// Selection strategy
    pub load_balancer: LoadBalancerConfig,
    /// Backends in selection order
    pub backends: Vec<BackendConfig>,
    /// Health check configuration
    pub health_check: HealthCheckConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl FulcrumConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Replace zero or empty values with their defaults.
    pub fn apply_defaults(mut self) -> Self {
        if self.server.port == 0 {
            self.server.port = server::DEFAULT_PORT;
        }
        if self.load_balancer.strategy.trim().is_empty() {
            self.load_balancer.strategy = StrategyKind::default().to_string();
        }
        for backend in &mut self.backends {
            if backend.weight == 0 {
                backend.weight = 1;
            }
        }
        self.health_check.apply_defaults();
        self
    }

    /// Apply environment variable overrides
    ///
    /// Supports FULCRUM_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply FULCRUM_* overrides read through `lookup`.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Server settings
        if let Some(port) = lookup("FULCRUM_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(host) = lookup("FULCRUM_HOST") {
            self.server.host = host;
        }

        if let Some(strategy) = lookup("FULCRUM_STRATEGY") {
            self.load_balancer.strategy = strategy;
        }

        // Logging settings
        if let Some(level) = lookup("FULCRUM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("FULCRUM_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Some(health) = lookup("FULCRUM_HEALTH_CHECK") {
            self.health_check.enabled = health.to_lowercase() == "true";
        }

        self
    }

    /// Parsed strategy name.
    pub fn strategy_kind(&self) -> Result<StrategyKind, ConfigError> {
        self.load_balancer
            .strategy
            .parse()
            .map_err(|e: crate::routing::RoutingError| {
                ConfigError::validation("load_balancer.strategy", e.to_string())
            })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "port must be non-zero",
            ));
        }
        if self.server.admin_port == Some(self.server.port) {
            return Err(ConfigError::validation(
                "server.admin_port",
                "admin port must differ from the proxy port",
            ));
        }

        self.strategy_kind()?;

        if reqwest::Method::from_bytes(self.health_check.method.to_uppercase().as_bytes()).is_err()
        {
            return Err(ConfigError::validation(
                "health_check.method",
                format!("'{}' is not an HTTP method", self.health_check.method),
            ));
        }

        self.logging.validate()?;

        for (i, backend) in self.backends.iter().enumerate() {
            if backend.url.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("backends[{}].url", i),
                    "URL cannot be empty",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_fulcrum_config_defaults() {
        let config = FulcrumConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.load_balancer.strategy, "round-robin");
        assert!(config.health_check.enabled);
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_config_parse_minimal_toml() {
        let toml = r#"
        [server]
        port = 9000
        "#;
        let config: FulcrumConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0"); // Default
        assert_eq!(config.health_check.path, "/health"); // Default
    }

    #[test]
    fn test_config_parse_example_file() {
        let toml = include_str!("../../fulcrum.example.toml");
        let config: FulcrumConfig = toml::from_str(toml).unwrap();
        assert!(config.server.port > 0);
        assert!(!config.backends.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_backends_in_order() {
        let toml = r#"
        [[backends]]
        url = "http://10.0.0.1:8000"
        weight = 5

        [[backends]]
        url = "http://10.0.0.2:8000"
        "#;
        let config: FulcrumConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].url, "http://10.0.0.1:8000");
        assert_eq!(config.backends[1].weight, 1);
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 8181").unwrap();

        let config = FulcrumConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.server.port, 8181);
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = FulcrumConfig::load(Some(Path::new("/nonexistent/fulcrum.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server\nport = ").unwrap();

        let result = FulcrumConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_apply_defaults_fills_zero_values() {
        let toml = r#"
        [server]
        port = 0

        [load_balancer]
        strategy = ""

        [[backends]]
        url = "http://localhost:9001"
        weight = 0

        [health_check]
        interval_seconds = 0
        failure_threshold = 0
        "#;
        let config: FulcrumConfig = toml::from_str(toml).unwrap();
        let config = config.apply_defaults();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.load_balancer.strategy, "round-robin");
        assert_eq!(config.backends[0].weight, 1);
        assert_eq!(config.health_check.interval_seconds, 10);
        assert_eq!(config.health_check.failure_threshold, 3);
    }

    #[test]
    fn test_validation_unknown_strategy_names_value() {
        let mut config = FulcrumConfig::default();
        config.load_balancer.strategy = "fastest-first".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "load_balancer.strategy"));
        assert!(err.to_string().contains("fastest-first"));
    }

    #[test]
    fn test_validation_invalid_probe_method() {
        let mut config = FulcrumConfig::default();
        config.health_check.method = "NOT VALID".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_backend_url() {
        let mut config = FulcrumConfig::default();
        config.backends.push(BackendConfig::new("  ", 1));

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backends[0].url"));
    }

    #[test]
    fn test_validation_admin_port_conflict() {
        let mut config = FulcrumConfig::default();
        config.server.admin_port = Some(config.server.port);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strategy_kind_parses_config_name() {
        let mut config = FulcrumConfig::default();
        config.load_balancer.strategy = "smooth-weighted-round-robin".to_string();
        assert_eq!(
            config.strategy_kind().unwrap(),
            StrategyKind::SmoothWeightedRoundRobin
        );
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: std::collections::HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_env_override_server() {
        let config = FulcrumConfig::default()
            .with_overrides_from(env(&[("FULCRUM_PORT", "9999"), ("FULCRUM_HOST", "127.0.0.1")]));
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_config_env_override_strategy() {
        let config =
            FulcrumConfig::default().with_overrides_from(env(&[("FULCRUM_STRATEGY", "random")]));
        assert_eq!(config.load_balancer.strategy, "random");
    }

    #[test]
    fn test_config_env_override_logging() {
        let config = FulcrumConfig::default().with_overrides_from(env(&[
            ("FULCRUM_LOG_LEVEL", "debug"),
            ("FULCRUM_LOG_FORMAT", "json"),
        ]));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_config_env_invalid_values_ignored() {
        let config = FulcrumConfig::default().with_overrides_from(env(&[
            ("FULCRUM_PORT", "not-a-number"),
            ("FULCRUM_LOG_FORMAT", "xml"),
        ]));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_env_override_health_check() {
        let config = FulcrumConfig::default()
            .with_overrides_from(env(&[("FULCRUM_HEALTH_CHECK", "false")]));
        assert!(!config.health_check.enabled);
    }
}
