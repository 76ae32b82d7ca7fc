//! Load balancer configuration

use crate::routing::StrategyKind;
use serde::{Deserialize, Serialize};

/// `[load_balancer]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Strategy name, e.g. `round-robin`
    ///
    /// Kept as a string so an unknown name is reported by `validate` with
    /// the offending value instead of as a generic parse error.
    pub strategy: String,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default().to_string(),
        }
    }
}
