//! # Request Dispatcher
//!
//! Accepts every inbound request, asks the load balancer for a backend and
//! relays the exchange.
//!
//! - No alive backend: `503 Service Unavailable`, nothing is forwarded.
//! - Transport failure: the backend's error count goes up and the client
//!   gets `502 Bad Gateway`. Requests are never retried.
//! - Any backend response is relayed with its status, headers and streamed
//!   body. Statuses of 400 and above also count as backend errors.
//!
//! Request bodies are never buffered or capped; they stream through to the
//! backend whatever their size.
//!
//! ## Example
//!
//! ```no_run
//! use fulcrum::balancer::LoadBalancer;
//! use fulcrum::proxy::{create_router, AppState, HttpForwarder};
//! use fulcrum::registry::Backend;
//! use fulcrum::routing::create_strategy;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let balancer = Arc::new(LoadBalancer::new(create_strategy("round-robin")?));
//! balancer.add_backend(Backend::parse("http://127.0.0.1:9001", 1)?)?;
//!
//! let state = Arc::new(AppState::new(balancer, Arc::new(HttpForwarder::new(None)?)));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod error;
pub mod forwarder;

pub use admin::{create_admin_router, AdminState};
pub use error::ForwardError;
pub use forwarder::{Forwarder, HttpForwarder, ProxyRequest};

use crate::balancer::LoadBalancer;
use crate::logging::{generate_request_id, REQUEST_ID_HEADER};
use crate::routing::RequestContext;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared state of the proxy listener.
pub struct AppState {
    pub balancer: Arc<LoadBalancer>,
    pub forwarder: Arc<dyn Forwarder>,
}

impl AppState {
    pub fn new(balancer: Arc<LoadBalancer>, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            balancer,
            forwarder,
        }
    }
}

/// Create the proxy router: every method and path goes to [`dispatch`].
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Forward one inbound request to a selected backend.
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let ctx = RequestContext {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        host: request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        client_addr,
    };

    let Some(guard) = state.balancer.acquire(&ctx) else {
        metrics::counter!("fulcrum_unavailable_total").increment(1);
        tracing::warn!(
            request_id = %request_id,
            method = %ctx.method,
            path = %ctx.path,
            "No backend available"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response();
    };

    // The body is streamed to the backend as it arrives
    let (parts, body) = request.into_parts();

    let mut headers = parts.headers;
    if !headers.contains_key(REQUEST_ID_HEADER) {
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
    }

    let upstream = ProxyRequest {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        headers,
        body,
        client_addr,
    };

    let backend_label = guard.id().to_string();
    guard.increment_requests();
    let start = Instant::now();

    match state.forwarder.forward(&guard, upstream).await {
        Ok(response) => {
            let status = response.status();
            metrics::histogram!("fulcrum_request_duration_seconds",
                "backend" => backend_label.clone()
            )
            .record(start.elapsed().as_secs_f64());
            metrics::counter!("fulcrum_requests_total",
                "backend" => backend_label.clone(),
                "status" => status.as_u16().to_string()
            )
            .increment(1);

            if status.as_u16() >= 400 {
                guard.increment_errors();
                metrics::counter!("fulcrum_errors_total",
                    "backend" => backend_label.clone(),
                    "kind" => "status"
                )
                .increment(1);
            }

            tracing::debug!(
                request_id = %request_id,
                backend = %backend_label,
                status = status.as_u16(),
                latency_ms = start.elapsed().as_millis() as u64,
                "Request forwarded"
            );

            // The connection slot is held until the body has been relayed
            let (parts, body) = response.into_parts();
            let body = Body::from_stream(body.into_data_stream().map(move |chunk| {
                let _held = &guard;
                chunk
            }));
            Response::from_parts(parts, body)
        }
        Err(e) => {
            guard.increment_errors();
            metrics::counter!("fulcrum_requests_total",
                "backend" => backend_label.clone(),
                "status" => "502"
            )
            .increment(1);
            metrics::counter!("fulcrum_errors_total",
                "backend" => backend_label.clone(),
                "kind" => e.kind()
            )
            .increment(1);
            tracing::warn!(
                request_id = %request_id,
                backend = %backend_label,
                error = %e,
                "Forwarding failed"
            );
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    }
}
