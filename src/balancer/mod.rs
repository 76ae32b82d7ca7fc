//! Load balancer orchestration.
//!
//! Ties the server pool, the selection strategy and the health checker
//! together. Request tasks go through [`LoadBalancer::acquire`] so every
//! selection is paired with exactly one release of the backend's active
//! connection count.

use crate::health::{
    HealthCheckConfig, HealthCheckError, HealthCheckResult, HealthChecker, HealthStatus,
};
use crate::registry::{Backend, BackendView, RegistryError, ServerPool};
use crate::routing::{RequestContext, Strategy, StrategyKind};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;


/// Orchestrates backend selection, connection accounting and health state.
pub struct LoadBalancer {
    pool: Arc<ServerPool>,
    strategy: Arc<dyn Strategy>,
    health: Mutex<Option<Arc<HealthChecker>>>,
    /// Serializes add/remove so pool, health checker and strategy ledger
    /// see membership changes in the same order
    membership: Mutex<()>,
}

impl LoadBalancer {
    /// Create a load balancer with an empty pool.
    pub fn new(strategy: Arc<dyn Strategy>) -> Self {
        Self {
            pool: Arc::new(ServerPool::new()),
            strategy,
            health: Mutex::new(None),
            membership: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    /// Human-readable strategy name.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Pick a backend and count one more active connection on it.
    ///
    /// Every `Some` must be paired with one [`complete`](Self::complete).
    /// Prefer [`acquire`](Self::acquire), which does that on drop.
    pub fn select(&self, ctx: &RequestContext) -> Option<Arc<Backend>> {
        let Some(backend) = self.strategy.select(&self.pool, ctx) else {
            tracing::warn!(strategy = self.strategy_name(), "No alive backend available");
            return None;
        };

        let active = backend.increment_active();
        metrics::gauge!("fulcrum_active_connections", "backend" => backend.id().to_string())
            .set(active as f64);
        tracing::debug!(backend = %backend.id(), active, "Selected backend");
        Some(backend)
    }

    /// Release the active connection taken by [`select`](Self::select).
    pub fn complete(&self, backend: &Backend) {
        release(backend);
    }

    /// Select a backend and hold its connection slot until the guard drops.
    pub fn acquire(&self, ctx: &RequestContext) -> Option<ConnectionGuard> {
        self.select(ctx).map(|backend| ConnectionGuard { backend })
    }

    /// Add a backend to the pool, the health checker and the strategy ledger.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateBackend` if the identity is taken.
    pub fn add_backend(&self, backend: Backend) -> Result<Arc<Backend>, RegistryError> {
        let _membership = self.membership.lock();

        let backend = self.pool.add(backend)?;
        if let Some(checker) = self.health.lock().as_ref() {
            checker.register_backend(Arc::clone(&backend));
        }
        if let Some(events) = self.strategy.backend_events() {
            events.on_backend_added(&backend);
        }

        tracing::info!(backend = %backend.id(), weight = backend.weight(), "Added backend");
        metrics::gauge!("fulcrum_backend_up", "backend" => backend.id().to_string())
            .set(if backend.is_alive() { 1.0 } else { 0.0 });
        self.record_pool_gauges();
        Ok(backend)
    }

    /// Remove a backend everywhere. Requests already holding it finish
    /// normally. Unknown identities are a no-op.
    pub fn remove_backend(&self, id: &str) -> Option<Arc<Backend>> {
        let _membership = self.membership.lock();

        let backend = self.pool.remove(id)?;
        if let Some(checker) = self.health.lock().as_ref() {
            checker.deregister_backend(id);
        }
        if let Some(events) = self.strategy.backend_events() {
            events.on_backend_removed(id);
        }

        tracing::info!(backend = %id, "Removed backend");
        self.record_pool_gauges();
        Some(backend)
    }

    /// Change a backend's weight and tell the strategy about it.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::BackendNotFound` if no backend has this identity.
    pub fn set_weight(&self, id: &str, weight: u32) -> Result<(), RegistryError> {
        let backend = self
            .pool
            .get(id)
            .ok_or_else(|| RegistryError::BackendNotFound(id.to_string()))?;

        let previous = backend.set_weight(weight);
        if let Some(events) = self.strategy.backend_events() {
            events.on_weight_changed(id, weight);
        }
        tracing::info!(backend = %id, previous, weight, "Backend weight changed");
        Ok(())
    }

    /// Start probing every pooled backend.
    ///
    /// Returns `Ok(false)` if health checking is already running.
    ///
    /// # Errors
    ///
    /// Propagates `HealthCheckError` when the checker cannot be built.
    pub fn start_health_checking(
        &self,
        config: HealthCheckConfig,
    ) -> Result<bool, HealthCheckError> {
        let checker = HealthChecker::new(config)?;
        self.start_health_checker(checker)
    }

    /// Start probing with a pre-built checker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_health_checker(&self, checker: HealthChecker) -> Result<bool, HealthCheckError> {
        let _membership = self.membership.lock();
        let mut slot = self.health.lock();
        if slot.as_ref().is_some_and(|running| running.is_running()) {
            return Ok(false);
        }

        checker.update_backends(self.pool.all_backends());
        let checker = Arc::new(checker);
        checker.start();
        *slot = Some(checker);
        Ok(true)
    }

    /// Stop the health loop and wait until no probe is in flight.
    ///
    /// The last results stay available through
    /// [`health_results`](Self::health_results).
    pub async fn stop_health_checking(&self) {
        let checker = self.health.lock().clone();
        if let Some(checker) = checker {
            checker.stop().await;
        }
    }

    pub fn is_health_checking(&self) -> bool {
        self.health
            .lock()
            .as_ref()
            .is_some_and(|checker| checker.is_running())
    }

    /// Latest probe result per backend identity.
    pub fn health_results(&self) -> HashMap<String, HealthCheckResult> {
        self.health
            .lock()
            .as_ref()
            .map(|checker| checker.results())
            .unwrap_or_default()
    }

    /// Snapshot of the balancer for status output.
    pub fn status(&self) -> BalancerStatus {
        let results = self.health_results();
        let backends: Vec<BackendStatus> = self
            .pool
            .all_backends()
            .iter()
            .map(|backend| {
                let last_check = results.get(backend.id()).cloned();
                BackendStatus {
                    health: last_check
                        .as_ref()
                        .map(|result| result.status)
                        .unwrap_or(HealthStatus::Unknown),
                    last_check_ms: last_check.as_ref().map(|r| r.latency.as_millis() as u64),
                    last_check_at: last_check.map(|r| r.checked_at),
                    backend: BackendView::from(backend.as_ref()),
                }
            })
            .collect();

        let alive = backends.iter().filter(|b| b.backend.alive).count();
        BalancerStatus {
            strategy: self.strategy_name().to_string(),
            strategy_kind: self.strategy_kind(),
            health_checking: self.is_health_checking(),
            total_backends: backends.len(),
            alive_backends: alive,
            backends,
        }
    }

    fn record_pool_gauges(&self) {
        metrics::gauge!("fulcrum_backends_total").set(self.pool.len() as f64);
        metrics::gauge!("fulcrum_backends_alive").set(self.pool.alive_backends().len() as f64);
    }
}

fn release(backend: &Backend) {
    let active = backend.decrement_active();
    metrics::gauge!("fulcrum_active_connections", "backend" => backend.id().to_string())
        .set(active as f64);
}

/// A selected backend whose active connection is released on drop.
///
/// Dropping happens on every exit path of the request task, including
/// early returns, errors and panics.
#[derive(Debug)]
pub struct ConnectionGuard {
    backend: Arc<Backend>,
}

impl ConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl std::ops::Deref for ConnectionGuard {
    type Target = Backend;

    fn deref(&self) -> &Backend {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        release(&self.backend);
    }
}

/// Serializable snapshot of the whole balancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerStatus {
    /// Human-readable strategy name
    pub strategy: String,
    pub strategy_kind: StrategyKind,
    pub health_checking: bool,
    pub total_backends: usize,
    pub alive_backends: usize,
    pub backends: Vec<BackendStatus>,
}

impl BalancerStatus {
    /// Aggregate state: every backend alive, some alive, or none.
    pub fn overall(&self) -> OverallHealth {
        if self.total_backends > 0 && self.alive_backends == self.total_backends {
            OverallHealth::Healthy
        } else if self.alive_backends > 0 {
            OverallHealth::Degraded
        } else {
            OverallHealth::Unhealthy
        }
    }
}

/// One backend's counters plus its latest probe outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    #[serde(flatten)]
    pub backend: BackendView,
    /// `unknown` until the first probe completes
    pub health: HealthStatus,
    pub last_check_ms: Option<u64>,
    pub last_check_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallHealth::Healthy => write!(f, "healthy"),
            OverallHealth::Degraded => write!(f, "degraded"),
            OverallHealth::Unhealthy => write!(f, "unhealthy"),
        }
    }
}
