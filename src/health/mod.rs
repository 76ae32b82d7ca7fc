//! Health checking module for backend health monitoring.
//!
//! A background loop probes every registered backend once per interval and
//! feeds each outcome into the backend's hysteresis state machine: an alive
//! backend is marked dead after `failure_threshold` consecutive failures and
//! a dead backend is marked alive again after `success_threshold`
//! consecutive successes.

mod config;
mod error;
mod state;

#[cfg(test)]
mod tests;

pub use config::*;
pub use error::*;
pub use state::*;

use crate::registry::Backend;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Background service that periodically checks backend health.
pub struct HealthChecker {
    inner: Arc<CheckerInner>,
    /// Handle of the monitoring loop while it is running
    monitor: Mutex<Option<MonitorHandle>>,
}

struct MonitorHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct CheckerInner {
    /// HTTP client with connection pooling
    client: reqwest::Client,
    config: HealthCheckConfig,
    method: Method,
    /// Backends probed on every cycle
    backends: RwLock<Vec<Arc<Backend>>>,
    /// Most recent probe result per backend identity
    results: DashMap<String, HealthCheckResult>,
}

impl HealthChecker {
    /// Create a new health checker with its own HTTP client.
    ///
    /// Zero or empty config fields are replaced with defaults.
    ///
    /// # Errors
    ///
    /// Returns `HealthCheckError::InvalidRequest` if the configured method is
    /// not a valid HTTP method and `HealthCheckError::Client` if the HTTP
    /// client cannot be built.
    pub fn new(config: HealthCheckConfig) -> Result<Self, HealthCheckError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| HealthCheckError::Client(e.to_string()))?;
        Self::with_client(config, client)
    }

    /// Create a health checker with a custom HTTP client (for testing).
    pub fn with_client(
        mut config: HealthCheckConfig,
        client: reqwest::Client,
    ) -> Result<Self, HealthCheckError> {
        config.apply_defaults();
        let method = Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|_| HealthCheckError::InvalidRequest(format!("method '{}'", config.method)))?;

        Ok(Self {
            inner: Arc::new(CheckerInner {
                client,
                config,
                method,
                backends: RwLock::new(Vec::new()),
                results: DashMap::new(),
            }),
            monitor: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.inner.config
    }

    /// Add a backend to the set probed on each cycle.
    ///
    /// Registering the same identity twice is a no-op.
    pub fn register_backend(&self, backend: Arc<Backend>) {
        let mut backends = self.inner.backends.write();
        if backends.iter().any(|b| b.id() == backend.id()) {
            return;
        }
        tracing::info!(backend = %backend.id(), "Registered backend for health checking");
        backends.push(backend);
    }

    /// Stop probing a backend and drop its last result.
    pub fn deregister_backend(&self, id: &str) {
        self.inner.backends.write().retain(|b| b.id() != id);
        self.inner.results.remove(id);
    }

    /// Replace the whole set of probed backends.
    pub fn update_backends(&self, backends: Vec<Arc<Backend>>) {
        let count = backends.len();
        *self.inner.backends.write() = backends;
        tracing::info!(backends = count, "Health checker backend list updated");
    }

    pub fn backend_count(&self) -> usize {
        self.inner.backends.read().len()
    }

    /// Check a single backend's health.
    ///
    /// Issues the configured method against `base URL + path`. Any 2xx status
    /// is healthy; transport errors, timeouts and other statuses are not.
    pub async fn check_backend(&self, backend: &Backend) -> HealthCheckResult {
        self.inner.check_backend(backend).await
    }

    /// Apply a probe result to the backend's state and keep it as the latest.
    ///
    /// Results for backends that are not registered are discarded.
    pub fn apply_result(&self, backend: &Backend, result: HealthCheckResult) -> Option<Transition> {
        self.inner.apply_result(backend, result)
    }

    /// Probe all registered backends concurrently and wait for every probe.
    pub async fn check_all_backends(&self) -> Vec<HealthCheckResult> {
        self.inner.check_all_backends().await
    }

    /// Copy of the most recent result per backend identity.
    pub fn results(&self) -> HashMap<String, HealthCheckResult> {
        self.inner
            .results
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn result_for(&self, id: &str) -> Option<HealthCheckResult> {
        self.inner.results.get(id).map(|entry| entry.value().clone())
    }

    /// Start the monitoring loop.
    ///
    /// Runs a check cycle immediately, then one per interval. Calling this
    /// while the loop is already running does nothing and returns `false`.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            tracing::debug!("Health checker already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { inner.monitor(token).await });

        *monitor = Some(MonitorHandle { cancel, handle });
        true
    }

    /// Stop the monitoring loop and wait for it to exit.
    ///
    /// A cycle that is already probing runs to completion first, so when this
    /// returns no probe task is left and no backend state changes anymore.
    pub async fn stop(&self) {
        let Some(monitor) = self.monitor.lock().take() else {
            return;
        };

        monitor.cancel.cancel();
        if let Err(e) = monitor.handle.await {
            tracing::warn!(error = %e, "Health monitor task ended abnormally");
        }
        tracing::info!("Health checker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.monitor.lock().is_some()
    }
}

impl CheckerInner {
    async fn check_backend(&self, backend: &Backend) -> HealthCheckResult {
        let url = format!("{}{}", backend.id(), self.config.path);
        let start = Instant::now();

        let response = self
            .client
            .request(self.method.clone(), &url)
            .timeout(self.config.timeout())
            .send()
            .await;
        let latency = start.elapsed();

        metrics::histogram!("fulcrum_health_check_latency_seconds",
            "backend" => backend.id().to_string()
        )
        .record(latency.as_secs_f64());

        match response {
            Ok(response) if response.status().is_success() => {
                HealthCheckResult::healthy(backend.id(), latency)
            }
            Ok(response) => HealthCheckResult::unhealthy(
                backend.id(),
                latency,
                HealthCheckError::HttpError(response.status().as_u16()),
            ),
            Err(e) => HealthCheckResult::unhealthy(
                backend.id(),
                latency,
                Self::classify_error(e, self.config.timeout_seconds),
            ),
        }
    }

    /// Classify reqwest error into HealthCheckError.
    fn classify_error(e: reqwest::Error, timeout_seconds: u64) -> HealthCheckError {
        if e.is_timeout() {
            HealthCheckError::Timeout(timeout_seconds)
        } else if e.is_builder() {
            HealthCheckError::InvalidRequest(e.to_string())
        } else {
            HealthCheckError::ConnectionFailed(e.to_string())
        }
    }

    fn apply_result(&self, backend: &Backend, result: HealthCheckResult) -> Option<Transition> {
        let status = result.status;

        match &result.error {
            None => tracing::debug!(
                backend = %backend.id(),
                latency_ms = result.latency.as_millis() as u64,
                "Health check passed"
            ),
            Some(error) => tracing::debug!(
                backend = %backend.id(),
                error = %error,
                "Health check failed"
            ),
        }

        // Registration check and store happen under one read lock
        let registered = self.backends.read();
        if !registered.iter().any(|b| b.id() == backend.id()) {
            tracing::debug!(backend = %backend.id(), "Discarding result for deregistered backend");
            return None;
        }

        self.results.insert(backend.id().to_string(), result);
        let transition =
            backend.update_health(|state| apply_outcome(state, status, &self.config));
        drop(registered);

        match transition {
            Some(Transition::Recovered {
                consecutive_successes,
            }) => {
                tracing::info!(
                    backend = %backend.id(),
                    consecutive_successes,
                    "Backend marked as healthy"
                );
                metrics::gauge!("fulcrum_backend_up", "backend" => backend.id().to_string())
                    .set(1.0);
            }
            Some(Transition::Failed {
                consecutive_failures,
            }) => {
                tracing::warn!(
                    backend = %backend.id(),
                    consecutive_failures,
                    "Backend marked as unhealthy"
                );
                metrics::gauge!("fulcrum_backend_up", "backend" => backend.id().to_string())
                    .set(0.0);
            }
            None => {}
        }

        transition
    }

    async fn check_all_backends(self: &Arc<Self>) -> Vec<HealthCheckResult> {
        let backends = self.backends.read().clone();
        if backends.is_empty() {
            return Vec::new();
        }

        let mut probes = JoinSet::new();
        for backend in backends {
            let inner = Arc::clone(self);
            probes.spawn(async move {
                let result = inner.check_backend(&backend).await;
                inner.apply_result(&backend, result.clone());
                result
            });
        }

        let mut results = Vec::with_capacity(probes.len());
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!(error = %e, "Health probe task failed"),
            }
        }
        results
    }

    async fn monitor(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            interval_seconds = self.config.interval_seconds,
            backends = self.backends.read().len(),
            "Health checker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Health checker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let results = self.check_all_backends().await;
                    tracing::debug!(
                        backends_checked = results.len(),
                        "Health check cycle completed"
                    );
                }
            }
        }
    }
}
