//! Chat completion endpoint
//!
//! POST /api/chat dispatches on the request's `stream` flag: buffered
//! requests get a single JSON reply, streaming requests get an SSE relay.
//! Either way the conversation is anchored with the default system prompt
//! before it reaches the provider.

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use std::time::Instant;

use crate::chat::{ChatReply, ChatRequest};
use crate::error::AppError;
use crate::handlers::AppState;
use crate::handlers::extractor::ChatJson;
use crate::handlers::streaming;
use crate::metrics::{CallMode, Outcome, Route};
use crate::middleware::RequestId;
use crate::prompt;

/// POST /api/chat handler
///
/// The payload arrives as a `Result` so extraction failures can be counted
/// before the stable 400 goes out.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<ChatJson<ChatRequest>, AppError>,
) -> Result<Response, AppError> {
    let ChatJson(request) = match payload {
        Ok(payload) => payload,
        Err(error) => {
            state.metrics().record_request(Route::Chat, Outcome::Invalid);
            return Err(error);
        }
    };

    tracing::debug!(
        request_id = %request_id,
        message_count = request.messages().len(),
        stream = request.stream(),
        "received chat request"
    );

    let temperature = request.temperature();
    let max_tokens = request.max_tokens();
    let wants_stream = request.stream();
    let conversation = prompt::compose(request.into_messages());

    if wants_stream {
        return streaming::relay(state, request_id, conversation, temperature, max_tokens).await;
    }

    let started = Instant::now();
    let result = state
        .client()
        .complete(conversation, temperature, max_tokens)
        .await;
    state
        .metrics()
        .observe_upstream_duration(CallMode::Buffered, started.elapsed().as_secs_f64());

    match result {
        Ok(reply) => {
            state.metrics().record_request(Route::Chat, Outcome::Success);
            tracing::info!(
                request_id = %request_id,
                reply_chars = reply.chars().count(),
                "chat completion delivered"
            );
            Ok(Json(ChatReply::new(reply)).into_response())
        }
        Err(error) => {
            state
                .metrics()
                .record_request(Route::Chat, Outcome::UpstreamError);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::INVALID_MESSAGES_ERROR;
    use crate::config::Config;
    use crate::limiter::FixedWindowStore;
    use std::sync::Arc;

    fn create_test_state(base_url: &str) -> AppState {
        let toml = format!(
            r#"
[server]
host = "127.0.0.1"
port = 3000

[upstream]
base_url = "{}"
request_timeout_seconds = 5
"#,
            base_url
        );
        let config: Config = toml.parse().expect("should parse test config");
        let config = Arc::new(config);
        let limiter = Arc::new(FixedWindowStore::new(&config.rate_limit));
        AppState::new(config, "test-key".to_string(), limiter).expect("should create AppState")
    }

    fn chat_request(stream: bool) -> ChatRequest {
        let raw = format!(
            r#"{{"messages":[{{"role":"user","content":"hi"}}],"stream":{}}}"#,
            stream
        );
        serde_json::from_str(&raw).expect("test request should parse")
    }

    #[tokio::test]
    async fn test_extraction_failure_is_counted_and_propagated() {
        let state = create_test_state("http://127.0.0.1:9");
        let rejection = AppError::Validation(INVALID_MESSAGES_ERROR.to_string());

        let result = handler(
            State(state.clone()),
            Extension(RequestId::new()),
            Err(rejection),
        )
        .await;

        match result {
            Err(AppError::Validation(message)) => assert_eq!(message, INVALID_MESSAGES_ERROR),
            _ => panic!("expected validation error to propagate"),
        }
        let output = state.metrics().gather().expect("gather should succeed");
        assert!(output.contains("route=\"chat\""));
        assert!(output.contains("outcome=\"invalid\""));
    }

    #[tokio::test]
    async fn test_unreachable_provider_maps_to_upstream_error() {
        // port 9 (discard) refuses connections immediately
        let state = create_test_state("http://127.0.0.1:9");

        let result = handler(
            State(state.clone()),
            Extension(RequestId::new()),
            Ok(ChatJson(chat_request(false))),
        )
        .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        let output = state.metrics().gather().expect("gather should succeed");
        assert!(output.contains("outcome=\"upstream_error\""));
    }

    #[tokio::test]
    async fn test_unreachable_provider_fails_streaming_before_headers() {
        let state = create_test_state("http://127.0.0.1:9");

        let result = handler(
            State(state),
            Extension(RequestId::new()),
            Ok(ChatJson(chat_request(true))),
        )
        .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
    }
}
