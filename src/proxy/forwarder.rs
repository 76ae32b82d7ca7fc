//! Upstream forwarding over HTTP

use super::error::ForwardError;
use crate::registry::Backend;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::Method;
use axum::response::Response;
use std::net::SocketAddr;
use std::time::Duration;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    KEEP_ALIVE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// An inbound request on its way to a backend.
///
/// The body is the client's stream, not yet read.
pub struct ProxyRequest {
    pub method: Method,
    /// Path and query of the inbound URI, e.g. `/items?page=2`
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Body,
    pub client_addr: Option<SocketAddr>,
}

/// Sends a request to a backend and hands back its response.
///
/// `Err` means no response was obtained at all. Any response, whatever its
/// status, is `Ok`.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        backend: &Backend,
        request: ProxyRequest,
    ) -> Result<Response, ForwardError>;
}

/// Default forwarder built on a pooled `reqwest` client.
///
/// Redirects are not followed so the client sees the backend's 3xx as is.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    /// Create a forwarder; `timeout` bounds each upstream exchange.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ForwardError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(32);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ForwardError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    /// Use an existing client as is.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        backend: &Backend,
        request: ProxyRequest,
    ) -> Result<Response, ForwardError> {
        let url = format!("{}{}", backend.id(), request.path_and_query);
        let headers = upstream_headers(&request.headers, request.client_addr);

        let upstream = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(request.body.into_data_stream()))
            .send()
            .await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Headers sent to the backend for an inbound request.
///
/// Drops hop-by-hop headers, `Host` (set from the upstream URL) and
/// `Content-Length` (the body goes out chunked) and adds the
/// `X-Forwarded-*` headers.
pub fn upstream_headers(inbound: &HeaderMap, client_addr: Option<SocketAddr>) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    if let Some(host) = inbound.get(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let chain = match inbound.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}, {ip}"),
            _ => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("shop.example.com"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert(KEEP_ALIVE, HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("abc"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn test_strip_removes_connection_listed_headers() {
        let mut headers = inbound();
        strip_hop_by_hop(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(KEEP_ALIVE).is_none());
        assert!(headers.get("x-trace").is_none());
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_upstream_headers_set_forwarded_host_and_proto() {
        let headers = upstream_headers(&inbound(), None);

        assert_eq!(headers.get(X_FORWARDED_HOST).unwrap(), "shop.example.com");
        assert_eq!(headers.get(X_FORWARDED_PROTO).unwrap(), "http");
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
        assert!(headers.get(X_FORWARDED_FOR).is_none());
    }

    #[test]
    fn test_upstream_headers_append_client_address() {
        let mut inbound = inbound();
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        let addr: SocketAddr = "198.51.100.2:53211".parse().unwrap();

        let headers = upstream_headers(&inbound, Some(addr));
        assert_eq!(
            headers.get(X_FORWARDED_FOR).unwrap(),
            "203.0.113.7, 198.51.100.2"
        );
    }

    #[test]
    fn test_upstream_headers_start_forwarded_for_chain() {
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let headers = upstream_headers(&HeaderMap::new(), Some(addr));
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "127.0.0.1");
    }

    #[test]
    fn test_forward_error_kinds() {
        assert_eq!(ForwardError::Timeout("t".into()).kind(), "timeout");
        assert_eq!(ForwardError::Connection("c".into()).kind(), "connection");
        assert_eq!(
            ForwardError::InvalidRequest("i".into()).kind(),
            "invalid_request"
        );
    }
}
