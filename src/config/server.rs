//! Server configuration

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Separate listener for `/status`, `/health` and `/metrics`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            admin_port: None,
        }
    }
}
