//! Backend selection strategies
//!
//! Every strategy picks one backend from the pool's alive set. Strategies
//! keep their own cursor or ledger behind an atomic or a mutex so a single
//! instance can be shared across all request tasks.

use std::net::SocketAddr;
use std::sync::Arc;

pub mod error;
pub mod least_connections;
pub mod random;
pub mod round_robin;
pub mod smooth_weighted;
pub mod strategies;
pub mod weighted_round_robin;

pub use error::RoutingError;
pub use least_connections::LeastConnections;
pub use random::RandomSelection;
pub use round_robin::RoundRobin;
pub use smooth_weighted::SmoothWeightedRoundRobin;
pub use strategies::StrategyKind;
pub use weighted_round_robin::WeightedRoundRobin;

use crate::registry::{Backend, ServerPool};

/// Per-request information available to a strategy.
///
/// None of the built-in strategies look at it; it exists so request-aware
/// strategies can be added without changing the selection signature.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub host: Option<String>,
    pub client_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }
}

/// A policy that picks one backend for a request.
pub trait Strategy: Send + Sync {
    /// Pick a backend from the pool's alive set.
    ///
    /// Returns `None` when no backend is alive. Never changes liveness or
    /// counters of any backend.
    fn select(&self, pool: &ServerPool, ctx: &RequestContext) -> Option<Arc<Backend>>;

    fn kind(&self) -> StrategyKind;

    /// Human-readable name, e.g. "Round Robin".
    fn name(&self) -> &'static str {
        self.kind().label()
    }

    /// Membership and weight notifications, for strategies that keep
    /// per-backend state.
    fn backend_events(&self) -> Option<&dyn BackendEvents> {
        None
    }
}

/// Notifications a stateful strategy needs to keep its ledger in sync with
/// the pool.
pub trait BackendEvents: Send + Sync {
    fn on_backend_added(&self, backend: &Backend);
    fn on_backend_removed(&self, id: &str);
    fn on_weight_changed(&self, id: &str, weight: u32);
}

/// Build a strategy from its configuration name.
///
/// # Errors
///
/// Returns `RoutingError::UnknownStrategy` carrying the offending name.
pub fn create_strategy(name: &str) -> Result<Arc<dyn Strategy>, RoutingError> {
    let kind: StrategyKind = name.parse()?;
    Ok(strategy_for(kind))
}

/// Build a strategy instance of the given kind.
pub fn strategy_for(kind: StrategyKind) -> Arc<dyn Strategy> {
    match kind {
        StrategyKind::RoundRobin => Arc::new(RoundRobin::new()),
        StrategyKind::WeightedRoundRobin => Arc::new(WeightedRoundRobin::new()),
        StrategyKind::SmoothWeightedRoundRobin => Arc::new(SmoothWeightedRoundRobin::new()),
        StrategyKind::LeastConnections => Arc::new(LeastConnections::new()),
        StrategyKind::Random => Arc::new(RandomSelection::new()),
    }
}
