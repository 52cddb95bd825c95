//! Incremental parser for the provider's SSE response body
//!
//! Network reads arrive in arbitrary slices, so the parser buffers input
//! until a complete `\n\n`-terminated block is available, then extracts the
//! `data:` payload from each block. Malformed payloads are logged and
//! skipped rather than terminating the stream.

use crate::provider::types::{SSE_DONE_MARKER, StreamChunk};

/// One semantic event extracted from the provider's SSE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant text from a delta payload.
    Delta(String),
    /// The provider's end-of-stream marker.
    Done,
}

/// Stateful SSE block parser. Feed it raw body chunks in order; it returns
/// the events completed by each chunk and holds any partial block for the
/// next call.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one body chunk, returning all events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));
        // Normalizing the whole buffer also repairs a \r\n pair split
        // across chunk boundaries.
        if self.pending.contains('\r') {
            self.pending = self.pending.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(boundary) = self.pending.find("\n\n") {
            let block: String = self.pending.drain(..boundary + 2).collect();
            if let Some(event) = parse_block(block.trim_end_matches('\n')) {
                events.push(event);
            }
        }
        events
    }
}

/// Extract the event from one complete SSE block. Returns `None` for
/// comment-only blocks, payloads without assistant text, and payloads
/// that fail to parse.
fn parse_block(block: &str) -> Option<StreamEvent> {
    let payload = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");

    if payload.is_empty() {
        return None;
    }
    if payload == SSE_DONE_MARKER {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<StreamChunk>(&payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map(StreamEvent::Delta),
        Err(error) => {
            tracing::warn!(%error, "skipping malformed stream payload");
            None
        }
    }
}
