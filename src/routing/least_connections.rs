//! Least connections selection

use super::{RequestContext, Strategy, StrategyKind};
use crate::registry::{Backend, ServerPool};
use std::sync::Arc;

/// Picks the alive backend with the fewest active connections.
///
/// Ties go to the backend that comes first in pool order.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for LeastConnections {
    fn select(&self, pool: &ServerPool, _ctx: &RequestContext) -> Option<Arc<Backend>> {
        pool.alive_backends()
            .into_iter()
            .min_by_key(|backend| backend.active_connections())
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::LeastConnections
    }
}
