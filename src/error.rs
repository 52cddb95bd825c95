//! Error types for the gateway
//!
//! All errors implement `IntoResponse` for Axum handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Client-facing body for any upstream/provider failure. Provider error text
/// never reaches the client verbatim.
pub const UPSTREAM_ERROR_MESSAGE: &str = "AI service error. Please try again later.";

/// Client-facing body for over-quota requests.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Rate limit exceeded for {identity}")]
    RateLimited { identity: String },

    #[error("Upstream completion failed: {0}")]
    Upstream(String),

    #[error("Client disconnected mid-stream after {frames_sent} frames")]
    StreamAborted { frames_sent: usize },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited { identity } => {
                tracing::warn!(identity = %identity, "Rejecting over-quota request");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    RATE_LIMITED_MESSAGE.to_string(),
                )
            }
            Self::Upstream(detail) => {
                // Sanitization boundary: the detail is logged, the client
                // gets the generic message only.
                tracing::error!(error = %detail, "Upstream completion failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    UPSTREAM_ERROR_MESSAGE.to_string(),
                )
            }
            Self::StreamAborted { .. } => {
                tracing::warn!(error = %self, "Stream aborted before completion");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    UPSTREAM_ERROR_MESSAGE.to_string(),
                )
            }
            Self::ConfigFileRead { .. } | Self::ConfigParseFailed { .. } | Self::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
