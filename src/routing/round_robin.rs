//! Round robin selection

use super::{RequestContext, Strategy, StrategyKind};
use crate::registry::{Backend, ServerPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Rotates through the alive backends one request at a time.
///
/// The cursor indexes the alive set as it is at selection time, so when
/// backends die or recover the rotation shifts. Fairness is exact only
/// while the alive set is stable.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobin {
    fn select(&self, pool: &ServerPool, _ctx: &RequestContext) -> Option<Arc<Backend>> {
        let alive = pool.alive_backends();
        if alive.is_empty() {
            return None;
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % alive.len();
        alive.get(index).cloned()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::RoundRobin
    }
}
