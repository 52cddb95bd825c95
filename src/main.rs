//! Codemaster gateway HTTP server
//!
//! Starts an Axum web server that serves the chat frontend and relays
//! conversations to the configured completion provider.

use clap::Parser;
use codemaster_gateway::cli::{Cli, Command, generate_config_template};
use codemaster_gateway::config::{self, Config};
use codemaster_gateway::handlers::AppState;
use codemaster_gateway::limiter::{FixedWindowStore, spawn_sweeper};
use codemaster_gateway::{app, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Configuration template written to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Load configuration, then overlay the two environment-sourced values
    let mut config = Config::load(&cli.config)?;
    config.apply_port_override(std::env::var("PORT").ok())?;
    let api_key = config::resolve_api_key(
        &config.upstream.api_key_env,
        std::env::var(&config.upstream.api_key_env).ok(),
    )?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        model = %config.upstream.model,
        base_url = %config.upstream.base_url,
        "Starting Codemaster gateway on {}:{}",
        config.server.host,
        config.server.port
    );

    let config = Arc::new(config);

    // Admission store plus its background pruning task
    let store = Arc::new(FixedWindowStore::new(&config.rate_limit));
    spawn_sweeper(Arc::clone(&store));

    let state = AppState::new(Arc::clone(&config), api_key, store)?;
    let router = app::build(state);

    // Create socket address
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!("Listening on {}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    // Start server; per-connection peer addresses feed the admission gate
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
