//! HTTP client for the completion provider
//!
//! Wraps one `reqwest::Client` with the provider's endpoint, model, and
//! credentials, and exposes the two call shapes the gateway needs: a
//! buffered completion and a streaming one. Provider error detail stays in
//! the returned `AppError::Upstream` for logging; handlers decide what the
//! end client sees.

use crate::chat::ConversationTurn;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::provider::sse::{SseParser, StreamEvent};
use crate::provider::types::{CompletionRequest, CompletionResponse};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;

/// Reply substituted when the provider answers successfully but with no
/// assistant text.
pub const EMPTY_REPLY_FALLBACK: &str = "Sorry, no response generated.";

/// Client for the OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    request_timeout: Duration,
}

impl CompletionClient {
    /// Build a client from validated configuration plus the resolved API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &Config, api_key: String) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|error| {
                AppError::Config(format!("Failed to build HTTP client: {}", error))
            })?;

        Ok(Self {
            http,
            base_url: config.upstream.base_url.clone(),
            model: config.upstream.model.clone(),
            api_key,
            request_timeout: config.request_timeout(),
        })
    }

    /// Request a buffered completion and return the assistant's reply text.
    ///
    /// A successful response with no text (or empty text) maps to
    /// [`EMPTY_REPLY_FALLBACK`] rather than an error. The whole exchange is
    /// bounded by the configured request timeout.
    pub async fn complete(
        &self,
        messages: Vec<ConversationTurn>,
        temperature: f64,
        max_tokens: u32,
    ) -> AppResult<String> {
        let body = self.request_body(messages, temperature, max_tokens, false);

        let exchange = async {
            let response = self.dispatch(&body).await?;
            response
                .json::<CompletionResponse>()
                .await
                .map_err(|error| AppError::Upstream(format!("invalid response body: {}", error)))
        };

        let response = match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => return Err(error),
            Err(_elapsed) => return Err(self.timeout_error()),
        };

        Ok(extract_reply(response))
    }

    /// Open a streaming completion and return the stream of text fragments.
    ///
    /// The provider connection is fully established (headers received,
    /// status checked) before this returns, so connection failures surface
    /// as a plain `Err` here instead of inside the stream. The timeout
    /// bounds establishment only; an open stream may outlive it. Items end
    /// at the provider's end-of-stream marker, and dropping the stream
    /// closes the provider connection.
    pub async fn stream(
        &self,
        messages: Vec<ConversationTurn>,
        temperature: f64,
        max_tokens: u32,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let body = self.request_body(messages, temperature, max_tokens, true);

        let response = match tokio::time::timeout(self.request_timeout, self.dispatch(&body)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => return Err(error),
            Err(_elapsed) => return Err(self.timeout_error()),
        };

        let deltas = response
            .bytes_stream()
            .scan(SseParser::new(), |parser, chunk| {
                let events: Vec<AppResult<StreamEvent>> = match chunk {
                    Ok(bytes) => parser.feed(&bytes).into_iter().map(Ok).collect(),
                    Err(error) => vec![Err(AppError::Upstream(format!(
                        "stream read failed: {}",
                        error
                    )))],
                };
                future::ready(Some(stream::iter(events)))
            })
            .flatten()
            .take_while(|event| future::ready(!matches!(event, Ok(StreamEvent::Done))))
            .filter_map(|event| {
                future::ready(match event {
                    Ok(StreamEvent::Delta(content)) => Some(Ok(content)),
                    Ok(StreamEvent::Done) => None,
                    Err(error) => Some(Err(error)),
                })
            })
            .boxed();

        Ok(deltas)
    }

    /// POST the request body and verify the response status.
    async fn dispatch(&self, body: &CompletionRequest) -> AppResult<reqwest::Response> {
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|error| AppError::Upstream(format!("request failed: {}", error)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "provider returned {}: {}",
                status, detail
            )));
        }

        Ok(response)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn timeout_error(&self) -> AppError {
        AppError::Upstream(format!(
            "no response within {} seconds",
            self.request_timeout.as_secs()
        ))
    }

    fn request_body(
        &self,
        messages: Vec<ConversationTurn>,
        temperature: f64,
        max_tokens: u32,
        stream: bool,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens,
            stream,
        }
    }
}

/// Pull the reply text out of a buffered response, substituting the
/// fallback for missing or empty content.
fn extract_reply(response: CompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string())
}
