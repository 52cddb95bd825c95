//! SSE relay for streaming chat completions
//!
//! The provider connection is fully established before any response bytes
//! are committed, so connection failures still produce a clean JSON error
//! with the usual status code. Once the relay starts, each provider text
//! fragment becomes one SSE data frame and a final `[DONE]` frame marks
//! normal completion. Dropping the response stream (client disconnect)
//! tears down the provider call.

use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::convert::Infallible;
use std::time::{Duration, Instant};

use crate::chat::ConversationTurn;
use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::metrics::{CallMode, Metrics, Outcome, Route};
use crate::middleware::RequestId;
use crate::provider::types::SSE_DONE_MARKER;

/// Open the provider stream and turn it into an SSE response.
pub async fn relay(
    state: AppState,
    request_id: RequestId,
    conversation: Vec<ConversationTurn>,
    temperature: f64,
    max_tokens: u32,
) -> Result<Response, AppError> {
    let started = Instant::now();
    let upstream = state
        .client()
        .stream(conversation, temperature, max_tokens)
        .await;
    state
        .metrics()
        .observe_upstream_duration(CallMode::Streaming, started.elapsed().as_secs_f64());

    let upstream = match upstream {
        Ok(upstream) => upstream,
        Err(error) => {
            state
                .metrics()
                .record_request(Route::Chat, Outcome::UpstreamError);
            return Err(error);
        }
    };

    state.metrics().record_request(Route::Chat, Outcome::Success);
    tracing::info!(request_id = %request_id, "streaming chat relay started");

    let events = relay_events(upstream, state.metrics().clone(), request_id);

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response())
}

/// Tracks whether the relay reached its `[DONE]` frame. Dropped without
/// completing (client disconnect or mid-stream provider failure), it logs
/// the early end and counts the abort.
struct RelayGuard {
    request_id: RequestId,
    metrics: Metrics,
    frames_sent: usize,
    completed: bool,
}

impl RelayGuard {
    fn new(metrics: Metrics, request_id: RequestId) -> Self {
        Self {
            request_id,
            metrics,
            frames_sent: 0,
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
        tracing::debug!(
            request_id = %self.request_id,
            frames_sent = self.frames_sent,
            "stream relay completed"
        );
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.metrics.record_stream_abort();
            let reason = AppError::StreamAborted {
                frames_sent: self.frames_sent,
            };
            tracing::warn!(request_id = %self.request_id, %reason, "stream relay ended early");
        }
    }
}

/// Map provider text fragments onto SSE events.
///
/// Empty fragments are skipped, a clean provider end appends the `[DONE]`
/// frame, and a mid-stream provider error ends the event stream with no
/// `[DONE]` so clients can tell a truncated reply from a finished one.
fn relay_events(
    upstream: BoxStream<'static, AppResult<String>>,
    metrics: Metrics,
    request_id: RequestId,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = RelayGuard::new(metrics, request_id);

    upstream
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(guard, |guard, item| {
            let events = match item {
                Some(Ok(content)) => {
                    if content.is_empty() {
                        Vec::new()
                    } else {
                        guard.frames_sent += 1;
                        // Event::data panics on carriage returns
                        let content = if content.contains('\r') {
                            content.replace("\r\n", "\n").replace('\r', "\n")
                        } else {
                            content
                        };
                        vec![Event::default().data(content)]
                    }
                }
                Some(Err(error)) => {
                    tracing::error!(
                        request_id = %guard.request_id,
                        error = %error,
                        "provider stream failed mid-relay"
                    );
                    return future::ready(None);
                }
                None => {
                    guard.complete();
                    vec![Event::default().data(SSE_DONE_MARKER)]
                }
            };
            future::ready(Some(stream::iter(events)))
        })
        .flatten()
        .map(Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(items: Vec<AppResult<String>>) -> BoxStream<'static, AppResult<String>> {
        stream::iter(items).boxed()
    }

    fn abort_count(metrics: &Metrics) -> String {
        metrics
            .gather()
            .expect("gather should succeed")
            .lines()
            .find(|line| line.starts_with("codemaster_stream_aborts_total"))
            .expect("abort counter should be exported")
            .to_string()
    }

    #[tokio::test]
    async fn test_clean_end_appends_done_and_records_no_abort() {
        let metrics = Metrics::new().expect("metrics should build");
        let upstream = fragments(vec![Ok("He".to_string()), Ok("llo".to_string())]);

        let events: Vec<_> = relay_events(upstream, metrics.clone(), RequestId::new())
            .collect()
            .await;

        // two deltas plus the [DONE] frame
        assert_eq!(events.len(), 3);
        assert_eq!(abort_count(&metrics), "codemaster_stream_aborts_total 0");
    }

    #[tokio::test]
    async fn test_empty_fragments_are_skipped() {
        let metrics = Metrics::new().expect("metrics should build");
        let upstream = fragments(vec![
            Ok(String::new()),
            Ok("text".to_string()),
            Ok(String::new()),
        ]);

        let events: Vec<_> = relay_events(upstream, metrics, RequestId::new())
            .collect()
            .await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_midstream_error_ends_without_done() {
        let metrics = Metrics::new().expect("metrics should build");
        let upstream = fragments(vec![
            Ok("partial".to_string()),
            Err(AppError::Upstream("connection reset".to_string())),
            Ok("never delivered".to_string()),
        ]);

        let events: Vec<_> = relay_events(upstream, metrics.clone(), RequestId::new())
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(abort_count(&metrics), "codemaster_stream_aborts_total 1");
    }

    #[tokio::test]
    async fn test_client_drop_records_abort() {
        let metrics = Metrics::new().expect("metrics should build");
        let upstream = fragments(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let mut events = Box::pin(relay_events(upstream, metrics.clone(), RequestId::new()));

        assert!(events.next().await.is_some());
        drop(events);

        assert_eq!(abort_count(&metrics), "codemaster_stream_aborts_total 1");
    }

    #[tokio::test]
    async fn test_carriage_returns_do_not_panic_event_building() {
        let metrics = Metrics::new().expect("metrics should build");
        let upstream = fragments(vec![Ok("line one\r\nline two\r".to_string())]);

        let events: Vec<_> = relay_events(upstream, metrics, RequestId::new())
            .collect()
            .await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_error_only_stream_sends_nothing() {
        let metrics = Metrics::new().expect("metrics should build");
        let upstream = fragments(vec![Err(AppError::Upstream("early failure".to_string()))]);

        let events: Vec<_> = relay_events(upstream, metrics.clone(), RequestId::new())
            .collect()
            .await;
        assert!(events.is_empty());
        assert_eq!(abort_count(&metrics), "codemaster_stream_aborts_total 1");
    }
}
