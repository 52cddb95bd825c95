//! Wire types for the OpenAI-compatible chat-completions protocol
//!
//! These mirror the provider's JSON shapes and carry no invariants of their
//! own; everything here is built from already-validated request data or
//! parsed from provider responses.

use crate::chat::ConversationTurn;
use serde::{Deserialize, Serialize};

/// Sentinel data line the provider sends after its final content chunk.
pub const SSE_DONE_MARKER: &str = "[DONE]";

/// Outbound request body for `POST {base_url}/chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ConversationTurn>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Buffered completion response
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

/// One parsed SSE data payload in streaming mode
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: StreamDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamDelta {
    pub content: Option<String>,
}
