//! Codemaster gateway - stateless chat relay for the CODEMASTER assistant
//!
//! This library serves a chat frontend and relays conversations to an
//! OpenAI-compatible completion provider, in buffered or server-sent-event
//! streaming mode, behind per-client request admission.

pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod prompt;
pub mod provider;
pub mod telemetry;
