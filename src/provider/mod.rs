//! Completion provider integration
//!
//! A thin adapter over the provider's OpenAI-compatible chat-completions
//! API: one buffered call or one long-lived SSE stream per request, bearer
//! auth, and nothing retried. Provider failures are classified before they
//! leave this module so raw provider error text never reaches a client.

pub mod client;
pub mod sse;
pub mod types;

pub use client::{CompletionClient, EMPTY_REPLY_FALLBACK};
pub use sse::{SseParser, StreamEvent};
