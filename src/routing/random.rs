//! Uniform random selection

use super::{RequestContext, Strategy, StrategyKind};
use crate::registry::{Backend, ServerPool};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Picks an alive backend uniformly at random.
///
/// One generator is seeded from the OS when the strategy is built and then
/// shared by all selections.
#[derive(Debug)]
pub struct RandomSelection {
    rng: Mutex<StdRng>,
}

impl RandomSelection {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic generator for reproducible selection sequences.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for RandomSelection {
    fn select(&self, pool: &ServerPool, _ctx: &RequestContext) -> Option<Arc<Backend>> {
        let alive = pool.alive_backends();
        if alive.is_empty() {
            return None;
        }

        let index = self.rng.lock().random_range(0..alive.len());
        alive.get(index).cloned()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }
}
