//! # Metrics Collection Module
//!
//! Prometheus export of proxy and health-check metrics on `GET /metrics`.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `fulcrum_requests_total{backend, status}` - Forwarded requests
//! - `fulcrum_errors_total{backend, kind}` - Transport failures and error statuses
//! - `fulcrum_unavailable_total` - Requests answered 503 for lack of a backend
//!
//! **Histograms:**
//! - `fulcrum_request_duration_seconds{backend}` - Time until response headers
//! - `fulcrum_health_check_latency_seconds{backend}` - Probe latency
//!
//! **Gauges:**
//! - `fulcrum_backend_up{backend}` - 1 when alive, 0 when dead
//! - `fulcrum_active_connections{backend}` - In-flight requests
//! - `fulcrum_backends_total` - Pooled backends
//! - `fulcrum_backends_alive` - Alive backends

// Re-export PrometheusBuilder for test compatibility
pub use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::balancer::LoadBalancer;

/// Initialize Prometheus metrics exporter with custom histogram buckets.
///
/// Buckets cover proxied request and probe latencies in seconds.
///
/// Returns a PrometheusHandle that can be used to render metrics.
pub fn setup_metrics() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::Matcher;

    let duration_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("fulcrum_request_duration_seconds".to_string()),
            duration_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("fulcrum_health_check_latency_seconds".to_string()),
            duration_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Install the global recorder, or fall back to a detached handle when one
/// is already installed (e.g. in tests).
pub fn metrics_handle() -> PrometheusHandle {
    setup_metrics().unwrap_or_else(|e| {
        tracing::debug!("Metrics already initialized, creating new handle: {}", e);
        PrometheusBuilder::new().build_recorder().handle()
    })
}

/// Refresh pool-derived gauges from the balancer.
pub fn update_pool_gauges(balancer: &LoadBalancer) {
    let backends = balancer.pool().all_backends();
    let alive = backends.iter().filter(|b| b.is_alive()).count();

    metrics::gauge!("fulcrum_backends_total").set(backends.len() as f64);
    metrics::gauge!("fulcrum_backends_alive").set(alive as f64);

    for backend in &backends {
        let id = backend.id().to_string();
        metrics::gauge!("fulcrum_backend_up", "backend" => id.clone())
            .set(if backend.is_alive() { 1.0 } else { 0.0 });
        metrics::gauge!("fulcrum_active_connections", "backend" => id)
            .set(backend.active_connections() as f64);
    }
}

/// Render Prometheus metrics in text format after refreshing gauges.
pub fn render(handle: &PrometheusHandle, balancer: &LoadBalancer) -> String {
    update_pool_gauges(balancer);
    handle.render()
}
