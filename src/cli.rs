//! Command-line interface for the gateway
//!
//! Provides argument parsing and subcommand handling for the gateway binary.

use clap::{Parser, Subcommand};

/// Stateless chat gateway for the CODEMASTER coding assistant
#[derive(Parser)]
#[command(name = "codemaster-gateway")]
#[command(version)]
#[command(about = "Stateless chat gateway for the CODEMASTER coding assistant")]
#[command(
    long_about = "Serves the CODEMASTER chat frontend and relays conversations to an \
    OpenAI-compatible completion provider, with buffered and server-sent-event \
    streaming response modes."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Codemaster Gateway Configuration
# ================================
#
# This file configures the HTTP server, the upstream completion provider,
# request admission, and observability settings for the gateway.
#
# Every key is optional; omitted keys fall back to the defaults shown here.
# A missing config file means "all defaults".

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on. The PORT environment variable, when set, overrides this.
port = 3000

# Directory of pre-built client assets, served with an index.html fallback
# for single-page-app routing
assets_dir = "public"

# ─────────────────────────────────────────────────────────────────────────────
# UPSTREAM PROVIDER
# ─────────────────────────────────────────────────────────────────────────────

[upstream]
# OpenAI-compatible chat-completions API base URL
base_url = "https://api.groq.com/openai/v1"

# Model identifier sent with every completion request
model = "llama-3.3-70b-versatile"

# Name of the environment variable holding the provider API key.
# The key itself never goes in this file.
api_key_env = "GROQ_API_KEY"

# Upstream request timeout in seconds (1-300)
request_timeout_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# REQUEST ADMISSION
# ─────────────────────────────────────────────────────────────────────────────
#
# Fixed-window request cap, tracked per client IP, applied to the /api/
# routes only. Health, metrics, and static assets are never rate limited.

[rate_limit]
# Length of the admission window in seconds
window_seconds = 60

# Maximum admitted requests per identity per window
max_requests = 30

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
# For production, consider using a reverse proxy to restrict access
"#
}
