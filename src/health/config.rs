//! Configuration for health checking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_PATH: &str = "/health";
pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_THRESHOLD: u32 = 3;

/// Configuration for backend health checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Whether health checking is enabled
    pub enabled: bool,
    /// Seconds between health check cycles
    pub interval_seconds: u64,
    /// Timeout for each probe request
    pub timeout_seconds: u64,
    /// Path appended to the backend base URL
    pub path: String,
    /// HTTP method used for probes
    pub method: String,
    /// Consecutive successes before a dead backend is marked alive
    pub success_threshold: u32,
    /// Consecutive failures before an alive backend is marked dead
    pub failure_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            path: DEFAULT_PATH.to_string(),
            method: DEFAULT_METHOD.to_string(),
            success_threshold: DEFAULT_THRESHOLD,
            failure_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl HealthCheckConfig {
    /// Replace zero or empty fields with their defaults.
    pub fn apply_defaults(&mut self) {
        if self.interval_seconds == 0 {
            self.interval_seconds = DEFAULT_INTERVAL_SECONDS;
        }
        if self.timeout_seconds == 0 {
            self.timeout_seconds = DEFAULT_TIMEOUT_SECONDS;
        }
        if self.path.is_empty() {
            self.path = DEFAULT_PATH.to_string();
        } else if !self.path.starts_with('/') {
            self.path.insert(0, '/');
        }
        if self.method.is_empty() {
            self.method = DEFAULT_METHOD.to_string();
        }
        if self.success_threshold == 0 {
            self.success_threshold = DEFAULT_THRESHOLD;
        }
        if self.failure_threshold == 0 {
            self.failure_threshold = DEFAULT_THRESHOLD;
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
