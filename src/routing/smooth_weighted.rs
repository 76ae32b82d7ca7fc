//! Smooth weighted round robin selection
//!
//! Each pick adds every alive backend's weight to its running
//! `current_weight`, takes the backend with the highest running value and
//! subtracts the round's total weight from it. Over `sum(weights)` picks
//! every backend is chosen exactly `weight` times, spread out instead of in
//! bursts: weights `[5, 1, 1]` give `A A B A C A A`.

use super::{BackendEvents, RequestContext, Strategy, StrategyKind};
use crate::registry::{Backend, ServerPool};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LedgerEntry {
    weight: i64,
    current_weight: i64,
}

/// Nginx-style smooth weighted rotation.
///
/// The ledger is keyed by backend identity and kept in sync through
/// [`BackendEvents`]. Alive backends without a ledger entry are skipped.
#[derive(Debug, Default)]
pub struct SmoothWeightedRoundRobin {
    ledger: Mutex<HashMap<String, LedgerEntry>>,
}

impl SmoothWeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a strategy whose ledger already covers every pooled backend.
    pub fn for_pool(pool: &ServerPool) -> Self {
        let strategy = Self::new();
        for backend in pool.all_backends() {
            strategy.on_backend_added(&backend);
        }
        strategy
    }

    /// Running weight of a backend, if it is in the ledger.
    pub fn current_weight(&self, id: &str) -> Option<i64> {
        self.ledger.lock().get(id).map(|entry| entry.current_weight)
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().len()
    }
}

impl Strategy for SmoothWeightedRoundRobin {
    fn select(&self, pool: &ServerPool, _ctx: &RequestContext) -> Option<Arc<Backend>> {
        let alive = pool.alive_backends();
        if alive.is_empty() {
            return None;
        }

        let mut ledger = self.ledger.lock();
        let mut total = 0i64;
        let mut best: Option<(&Arc<Backend>, i64)> = None;

        for backend in &alive {
            let Some(entry) = ledger.get_mut(backend.id()) else {
                tracing::debug!(backend = %backend.id(), "Backend missing from weight ledger, skipping");
                continue;
            };
            entry.current_weight += entry.weight;
            total += entry.weight;

            if best.is_none_or(|(_, max)| entry.current_weight > max) {
                best = Some((backend, entry.current_weight));
            }
        }

        let (picked, _) = best?;
        if let Some(entry) = ledger.get_mut(picked.id()) {
            entry.current_weight -= total;
        }
        Some(Arc::clone(picked))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::SmoothWeightedRoundRobin
    }

    fn backend_events(&self) -> Option<&dyn BackendEvents> {
        Some(self)
    }
}

impl BackendEvents for SmoothWeightedRoundRobin {
    fn on_backend_added(&self, backend: &Backend) {
        self.ledger.lock().insert(
            backend.id().to_string(),
            LedgerEntry {
                weight: i64::from(backend.weight()),
                current_weight: 0,
            },
        );
    }

    fn on_backend_removed(&self, id: &str) {
        self.ledger.lock().remove(id);
    }

    fn on_weight_changed(&self, id: &str, weight: u32) {
        if let Some(entry) = self.ledger.lock().get_mut(id) {
            entry.weight = i64::from(weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::test_support::*;

    #[test]
    fn interleaves_heavy_backend() {
        let pool = pool_with_weights(&[5, 1, 1]);
        let strategy = SmoothWeightedRoundRobin::for_pool(&pool);
        assert_eq!(sequence(&strategy, &pool, 7), "AABACAA");
        // The cycle repeats once every running weight is back to zero
        assert_eq!(sequence(&strategy, &pool, 7), "AABACAA");
    }

    #[test]
    fn picks_each_backend_weight_times_per_cycle() {
        let pool = pool_with_weights(&[4, 2, 1]);
        let strategy = SmoothWeightedRoundRobin::for_pool(&pool);
        let picks = sequence(&strategy, &pool, 7);
        assert_eq!(picks.matches('A').count(), 4);
        assert_eq!(picks.matches('B').count(), 2);
        assert_eq!(picks.matches('C').count(), 1);
    }

    #[test]
    fn equal_weights_behave_like_round_robin() {
        let pool = pool_with_weights(&[1, 1, 1]);
        let strategy = SmoothWeightedRoundRobin::for_pool(&pool);
        assert_eq!(sequence(&strategy, &pool, 6), "ABCABC");
    }

    #[test]
    fn backend_without_ledger_entry_is_skipped() {
        let pool = pool_with_weights(&[1, 1]);
        let strategy = SmoothWeightedRoundRobin::new();
        strategy.on_backend_added(&pool.all_backends()[1]);
        assert_eq!(sequence(&strategy, &pool, 3), "BBB");
    }

    #[test]
    fn removed_backend_leaves_ledger() {
        let pool = pool_with_weights(&[1, 1]);
        let strategy = SmoothWeightedRoundRobin::for_pool(&pool);
        assert_eq!(strategy.ledger_len(), 2);

        let removed = pool.remove("http://127.0.0.1:9001").unwrap();
        strategy.on_backend_removed(removed.id());
        assert_eq!(strategy.ledger_len(), 1);
        assert!(strategy.current_weight(removed.id()).is_none());
        assert_eq!(sequence(&strategy, &pool, 2), "BB");
    }

    #[test]
    fn weight_change_reshapes_distribution() {
        let pool = pool_with_weights(&[1, 1]);
        let strategy = SmoothWeightedRoundRobin::for_pool(&pool);
        strategy.on_weight_changed("http://127.0.0.1:9001", 3);

        let picks = sequence(&strategy, &pool, 4);
        assert_eq!(picks.matches('A').count(), 3);
        assert_eq!(picks.matches('B').count(), 1);
    }

    #[test]
    fn dead_backend_does_not_accumulate_weight() {
        let pool = pool_with_weights(&[1, 1]);
        let strategy = SmoothWeightedRoundRobin::for_pool(&pool);
        pool.all_backends()[0].set_alive(false);

        sequence(&strategy, &pool, 3);
        assert_eq!(strategy.current_weight("http://127.0.0.1:9001"), Some(0));
    }

    #[test]
    fn zero_weights_still_select() {
        let pool = pool_with_weights(&[0, 0]);
        let strategy = SmoothWeightedRoundRobin::for_pool(&pool);
        assert_eq!(sequence(&strategy, &pool, 2), "AA");
    }
}
