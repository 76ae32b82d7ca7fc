//! Admin listener: runtime status, aggregate health and Prometheus metrics.

use crate::balancer::{LoadBalancer, OverallHealth};
use crate::metrics::PrometheusHandle;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared state of the admin listener.
pub struct AdminState {
    pub balancer: Arc<LoadBalancer>,
    pub metrics: PrometheusHandle,
    pub start_time: Instant,
}

impl AdminState {
    pub fn new(balancer: Arc<LoadBalancer>, metrics: PrometheusHandle) -> Self {
        Self {
            balancer,
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: OverallHealth,
    pub uptime_seconds: u64,
    pub backends_total: usize,
    pub backends_alive: usize,
}

/// Create the admin router.
pub fn create_admin_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for GET /status: full balancer snapshot as JSON.
async fn status_handler(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    Json(state.balancer.status())
}

/// Handler for GET /health.
///
/// 200 while at least one backend is alive, 503 otherwise.
async fn health_handler(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let status = state.balancer.status();
    let overall = status.overall();
    let code = match overall {
        OverallHealth::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        code,
        Json(HealthResponse {
            status: overall,
            uptime_seconds: state.start_time.elapsed().as_secs(),
            backends_total: status.total_backends,
            backends_alive: status.alive_backends,
        }),
    )
}

/// Handler for GET /metrics (Prometheus text format).
async fn metrics_handler(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let body = crate::metrics::render(&state.metrics, &state.balancer);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
