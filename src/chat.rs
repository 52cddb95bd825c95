//! Chat conversation types
//!
//! The inbound request schema for `POST /api/chat`, with validation enforced
//! during deserialization so an invalid request value cannot exist. All of
//! these types are request-scoped: nothing here outlives a single HTTP
//! exchange, and no conversation state is retained between requests.

use serde::{Deserialize, Deserializer, Serialize};

/// Stable client-facing message for every request-body failure on the chat
/// route. The underlying detail is logged, never returned.
pub const INVALID_MESSAGES_ERROR: &str = "Invalid messages array or missing user message";

/// Role of a conversation turn
///
/// `System` is meaningful only as the first element of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a chat exchange, tagged with a role
///
/// Ordering within a conversation is significant. Individual turns carry no
/// content constraint of their own; the conversation-level invariants (at
/// least one turn, final turn non-empty) live on [`ChatRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

/// Shared validation logic for request fields
///
/// This is the single source of truth for request validation, used by both
/// `try_new` and the serde deserializer so the rules cannot drift apart.
fn validate_request_fields(
    messages: &[ConversationTurn],
    temperature: f64,
    max_tokens: u32,
) -> Result<(), String> {
    if messages.is_empty() {
        return Err("messages array cannot be empty".to_string());
    }

    // The final turn is the active user query; an empty one has nothing to
    // complete. Earlier turns are history and may hold anything.
    match messages.last() {
        Some(last) if last.content.is_empty() => {
            return Err("final message content cannot be empty".to_string());
        }
        _ => {}
    }

    if temperature.is_nan() || temperature.is_infinite() {
        return Err("temperature must be a finite number".to_string());
    }
    if !(0.0..=2.0).contains(&temperature) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }

    if max_tokens == 0 {
        return Err("max_tokens must be greater than 0".to_string());
    }

    Ok(())
}

/// A chat completion request from the browser client
///
/// Validation is enforced during deserialization - invalid instances cannot
/// exist. Use [`ChatRequest::try_new`] for programmatic construction in
/// tests. Unspecified fields take the defaults the original client relied
/// on: temperature 0.7, max_tokens 2048, buffered (non-streaming) mode.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    messages: Vec<ConversationTurn>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

impl ChatRequest {
    /// Construct a validated request
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason for an invalid request: empty
    /// messages, empty final-turn content, out-of-range temperature, or
    /// zero max_tokens.
    pub fn try_new(
        messages: Vec<ConversationTurn>,
        temperature: f64,
        max_tokens: u32,
        stream: bool,
    ) -> Result<Self, String> {
        validate_request_fields(&messages, temperature, max_tokens)?;
        Ok(Self {
            messages,
            temperature,
            max_tokens,
            stream,
        })
    }

    /// Conversation history, oldest first
    pub fn messages(&self) -> &[ConversationTurn] {
        &self.messages
    }

    /// Consume the request, yielding the conversation for prompt composition
    pub fn into_messages(self) -> Vec<ConversationTurn> {
        self.messages
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Whether the client asked for an incremental event stream
    pub fn stream(&self) -> bool {
        self.stream
    }
}

impl<'de> Deserialize<'de> for ChatRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawRequest {
            messages: Vec<ConversationTurn>,
            temperature: Option<f64>,
            max_tokens: Option<u32>,
            #[serde(default)]
            stream: bool,
        }

        let raw = RawRequest::deserialize(deserializer)?;
        let temperature = raw.temperature.unwrap_or_else(default_temperature);
        let max_tokens = raw.max_tokens.unwrap_or_else(default_max_tokens);

        // Use shared validation logic, converting String error to serde error
        validate_request_fields(&raw.messages, temperature, max_tokens)
            .map_err(serde::de::Error::custom)?;

        Ok(ChatRequest {
            messages: raw.messages,
            temperature,
            max_tokens,
            stream: raw.stream,
        })
    }
}

/// The finalized assistant message for buffered mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

impl ChatReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}
