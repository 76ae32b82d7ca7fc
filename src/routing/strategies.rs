//! Names of the available selection strategies

use super::error::RoutingError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Selection strategy determines how a backend is picked from the alive set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Rotate through alive backends one request at a time
    #[default]
    RoundRobin,

    /// Stay on each backend for `weight` consecutive requests
    WeightedRoundRobin,

    /// Nginx-style interleaved weighted rotation
    SmoothWeightedRoundRobin,

    /// Pick the backend with the fewest in-flight requests
    LeastConnections,

    /// Pick uniformly at random
    Random,
}

impl StrategyKind {
    /// All strategies, in documentation order.
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::RoundRobin,
        StrategyKind::WeightedRoundRobin,
        StrategyKind::SmoothWeightedRoundRobin,
        StrategyKind::LeastConnections,
        StrategyKind::Random,
    ];

    /// Name used in configuration files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "round-robin",
            StrategyKind::WeightedRoundRobin => "weighted-round-robin",
            StrategyKind::SmoothWeightedRoundRobin => "smooth-weighted-round-robin",
            StrategyKind::LeastConnections => "least-connections",
            StrategyKind::Random => "random",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "Round Robin",
            StrategyKind::WeightedRoundRobin => "Weighted Round Robin",
            StrategyKind::SmoothWeightedRoundRobin => "Smooth Weighted Round Robin",
            StrategyKind::LeastConnections => "Least Connections",
            StrategyKind::Random => "Random",
        }
    }
}

/// Names match exactly; case and surrounding whitespace are not ignored.
impl FromStr for StrategyKind {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RoutingError::UnknownStrategy(s.to_string()))
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
