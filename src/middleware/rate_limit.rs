//! Per-client admission control for the API surface
//!
//! Applied to the `/api/` subtree only; health checks, metrics scrapes,
//! and static assets are never rate limited. Identity is the connected
//! peer's IP address. Forwarded headers are not consulted.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::SystemTime;

use crate::error::AppError;
use crate::handlers::AppState;
use crate::metrics::{Outcome, Route};

/// Identity recorded when the peer address is unavailable.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Admit or reject the request against the per-identity counter.
///
/// Rejections become `AppError::RateLimited`, which renders as a 429 with
/// a stable JSON body.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = client_identity(&request);

    if !state.limiter().increment(&identity, SystemTime::now()).await {
        state.metrics().record_rate_limited();
        if let Some(route) = Route::from_path(request.uri().path()) {
            state.metrics().record_request(route, Outcome::RateLimited);
        }
        return Err(AppError::RateLimited { identity });
    }

    Ok(next.run(request).await)
}

/// Resolve the client identity from the connection's peer address.
fn client_identity(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with_peer(addr: Option<SocketAddr>) -> Request {
        let mut request = HttpRequest::builder()
            .uri("/api/chat")
            .body(Body::empty())
            .expect("request should build");
        if let Some(addr) = addr {
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }

    #[test]
    fn test_identity_is_peer_ip_without_port() {
        let addr: SocketAddr = "203.0.113.7:54321".parse().expect("valid address");
        assert_eq!(client_identity(&request_with_peer(Some(addr))), "203.0.113.7");
    }

    #[test]
    fn test_identity_ipv6_peer() {
        let addr: SocketAddr = "[2001:db8::1]:443".parse().expect("valid address");
        assert_eq!(client_identity(&request_with_peer(Some(addr))), "2001:db8::1");
    }

    #[test]
    fn test_identity_falls_back_when_peer_unknown() {
        assert_eq!(client_identity(&request_with_peer(None)), UNKNOWN_IDENTITY);
    }

    #[test]
    fn test_same_ip_different_ports_share_identity() {
        let first: SocketAddr = "198.51.100.2:1000".parse().expect("valid address");
        let second: SocketAddr = "198.51.100.2:2000".parse().expect("valid address");
        assert_eq!(
            client_identity(&request_with_peer(Some(first))),
            client_identity(&request_with_peer(Some(second)))
        );
    }
}
