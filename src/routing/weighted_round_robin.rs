//! Weighted round robin selection

use super::{RequestContext, Strategy, StrategyKind};
use crate::registry::{Backend, ServerPool};
use parking_lot::Mutex;
use std::sync::Arc;

/// Serves each alive backend `weight` times in a row before moving on.
///
/// Weight 0 is treated as 1. Cursor and repeat count are updated together
/// under one lock.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    state: Mutex<Cursor>,
}

#[derive(Debug, Default)]
struct Cursor {
    index: usize,
    /// Picks already served by the backend at `index`
    served: u32,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for WeightedRoundRobin {
    fn select(&self, pool: &ServerPool, _ctx: &RequestContext) -> Option<Arc<Backend>> {
        let alive = pool.alive_backends();
        if alive.is_empty() {
            return None;
        }

        let mut cursor = self.state.lock();
        if cursor.index >= alive.len() {
            cursor.index = 0;
            cursor.served = 0;
        }

        let weight = alive[cursor.index].weight().max(1);
        if cursor.served < weight {
            cursor.served += 1;
        } else {
            cursor.index = (cursor.index + 1) % alive.len();
            cursor.served = 1;
        }

        alive.get(cursor.index).cloned()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::WeightedRoundRobin
    }
}
