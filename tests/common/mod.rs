//! Shared test utilities for Fulcrum integration tests.

#![allow(dead_code)]

use fulcrum::balancer::LoadBalancer;
use fulcrum::proxy::{create_router, AppState, HttpForwarder};
use fulcrum::registry::Backend;
use fulcrum::routing::create_strategy;
use std::net::SocketAddr;
use std::sync::Arc;

/// Create a balancer with the named strategy and the given backend URLs.
pub fn balancer_with(strategy: &str, urls: &[String]) -> Arc<LoadBalancer> {
    let balancer = Arc::new(LoadBalancer::new(create_strategy(strategy).unwrap()));
    for url in urls {
        balancer.add_backend(Backend::parse(url, 1).unwrap()).unwrap();
    }
    balancer
}

/// Serve the proxy router on an ephemeral port and return its base URL.
pub async fn spawn_proxy(balancer: Arc<LoadBalancer>) -> String {
    let forwarder = Arc::new(HttpForwarder::new(None).unwrap());
    let app = create_router(Arc::new(AppState::new(balancer, forwarder)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{}", addr)
}

/// An address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
