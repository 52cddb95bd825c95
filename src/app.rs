//! Router assembly
//!
//! Builds the full Axum application: API routes behind admission control,
//! operational endpoints, and static assets with an index.html fallback
//! for client-side routing, all wrapped in the shared middleware stack.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    middleware,
    routing::{get, post},
};
use std::path::PathBuf;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::handlers::{self, AppState};
use crate::middleware::{attach_request_id, enforce_rate_limit};

/// Request bodies above this size are rejected before parsing.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Assemble the application router around shared state.
pub fn build(state: AppState) -> Router {
    let assets_dir = PathBuf::from(&state.config().server.assets_dir);
    let index = assets_dir.join("index.html");

    // Admission control covers the API surface only; operational endpoints
    // and assets stay reachable for over-quota clients.
    let api = Router::new()
        .route("/api/chat", post(handlers::chat::handler))
        .route("/api/feedback", post(handlers::feedback::handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ));

    Router::new()
        .merge(api)
        .route("/health", get(handlers::health::handler))
        .route("/metrics", get(handlers::metrics::handler))
        .fallback_service(ServeDir::new(&assets_dir).not_found_service(ServeFile::new(index)))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(attach_request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
