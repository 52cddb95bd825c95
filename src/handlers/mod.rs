//! HTTP request handlers for the gateway API

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::limiter::CounterStore;
use crate::metrics::Metrics;
use crate::provider::CompletionClient;
use std::sync::Arc;

pub mod chat;
pub mod extractor;
pub mod feedback;
pub mod health;
pub mod metrics;
pub mod streaming;

/// Application state shared across all handlers
///
/// Holds configuration, the provider client, the admission counter store,
/// and the metrics collector. Cloning is cheap; every field is either an
/// Arc or already clone-by-handle.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    client: CompletionClient,
    limiter: Arc<dyn CounterStore>,
    metrics: Metrics,
}

impl AppState {
    /// Create application state from validated configuration.
    ///
    /// The counter store is passed in rather than built here so the caller
    /// keeps a concrete handle (the sweeper needs one) and tests can inject
    /// doubles.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider client or metrics registry cannot
    /// be constructed.
    pub fn new(
        config: Arc<Config>,
        api_key: String,
        limiter: Arc<dyn CounterStore>,
    ) -> AppResult<Self> {
        let client = CompletionClient::new(&config, api_key)?;
        let metrics = Metrics::new()
            .map_err(|e| AppError::Config(format!("Failed to register metrics: {}", e)))?;

        Ok(Self {
            config,
            client,
            limiter,
            metrics,
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the completion provider client
    pub fn client(&self) -> &CompletionClient {
        &self.client
    }

    /// Get reference to the admission counter store
    pub fn limiter(&self) -> &dyn CounterStore {
        self.limiter.as_ref()
    }

    /// Get reference to the metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
