//! Fixed-window rate limiting for the API surface
//!
//! Each client identity gets a request counter scoped to the current time
//! window. The store is behind a trait so handlers and middleware can be
//! exercised against deterministic test doubles, and a background sweeper
//! prunes counters for windows that have passed so the map does not grow
//! with every identity ever seen.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

use crate::config::RateLimitConfig;

/// Admission counter keyed by client identity.
///
/// `increment` records one request attempt at `now` and reports whether the
/// request is admitted under the store's policy.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, identity: &str, now: SystemTime) -> bool;
}

/// Counter store with fixed windows aligned to the epoch.
///
/// Window membership is `epoch_seconds / window_seconds`, so all clients
/// roll over at the same instants and a counter resets completely at each
/// boundary rather than sliding.
#[derive(Debug)]
pub struct FixedWindowStore {
    window_seconds: u64,
    max_requests: u32,
    counters: RwLock<HashMap<String, (u64, u32)>>,
}

impl FixedWindowStore {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window_seconds: config.window_seconds(),
            max_requests: config.max_requests(),
            counters: RwLock::new(HashMap::new()),
        }
    }

    fn window_index(&self, now: SystemTime) -> u64 {
        let epoch_seconds = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        epoch_seconds / self.window_seconds
    }

    /// Drop counters whose window has passed. Returns how many were removed.
    pub async fn prune(&self, now: SystemTime) -> usize {
        let current = self.window_index(now);
        let mut counters = self.counters.write().await;
        let before = counters.len();
        counters.retain(|_, (window, _)| *window >= current);
        before - counters.len()
    }

    /// Number of identities currently holding a counter.
    pub async fn tracked_identities(&self) -> usize {
        self.counters.read().await.len()
    }

    fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[async_trait]
impl CounterStore for FixedWindowStore {
    async fn increment(&self, identity: &str, now: SystemTime) -> bool {
        let window = self.window_index(now);
        let mut counters = self.counters.write().await;
        let entry = counters.entry(identity.to_string()).or_insert((window, 0));
        if entry.0 != window {
            *entry = (window, 0);
        }
        entry.1 = entry.1.saturating_add(1);
        entry.1 <= self.max_requests
    }
}

/// Spawn the background task that periodically prunes expired counters.
///
/// Runs once per window length for the store's lifetime. The handle is
/// returned for callers that want to abort it, but the server normally
/// lets it run until shutdown.
pub fn spawn_sweeper(store: Arc<FixedWindowStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(store.sweep_interval());
        // interval yields immediately on the first tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.prune(SystemTime::now()).await;
            if removed > 0 {
                tracing::debug!(removed, "pruned expired rate-limit counters");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(window_seconds: u64, max_requests: u32) -> FixedWindowStore {
        let config = RateLimitConfig::new(window_seconds, max_requests)
            .expect("test limits should be valid");
        FixedWindowStore::new(&config)
    }

    fn at(epoch_seconds: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(epoch_seconds)
    }

    #[tokio::test]
    async fn test_admits_up_to_cap_then_rejects() {
        let store = store(60, 30);
        for _ in 0..30 {
            assert!(store.increment("1.2.3.4", at(1000)).await);
        }
        assert!(!store.increment("1.2.3.4", at(1000)).await);
        assert!(!store.increment("1.2.3.4", at(1001)).await);
    }

    #[tokio::test]
    async fn test_window_boundary_resets_counter() {
        let store = store(60, 2);
        assert!(store.increment("a", at(59)).await);
        assert!(store.increment("a", at(59)).await);
        assert!(!store.increment("a", at(59)).await);

        // 60 starts a new epoch-aligned window
        assert!(store.increment("a", at(60)).await);
    }

    #[tokio::test]
    async fn test_same_window_spans_all_its_seconds() {
        let store = store(60, 1);
        assert!(store.increment("a", at(0)).await);
        assert!(!store.increment("a", at(30)).await);
        assert!(!store.increment("a", at(59)).await);
    }

    #[tokio::test]
    async fn test_identities_are_isolated() {
        let store = store(60, 1);
        assert!(store.increment("1.1.1.1", at(100)).await);
        assert!(!store.increment("1.1.1.1", at(100)).await);
        assert!(store.increment("2.2.2.2", at(100)).await);
    }

    #[tokio::test]
    async fn test_concurrent_burst_admits_exactly_the_cap() {
        let store = Arc::new(store(60, 30));
        let mut tasks = Vec::new();
        for _ in 0..45 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(
                async move { store.increment("burst", at(500)).await },
            ));
        }

        let mut admitted = 0;
        for task in tasks {
            if task.await.expect("task should not panic") {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 30);
    }

    #[tokio::test]
    async fn test_prune_removes_expired_counters_only() {
        let store = store(60, 30);
        store.increment("old", at(10)).await;
        store.increment("fresh", at(130)).await;
        assert_eq!(store.tracked_identities().await, 2);

        let removed = store.prune(at(130)).await;
        assert_eq!(removed, 1);
        assert_eq!(store.tracked_identities().await, 1);
    }

    #[tokio::test]
    async fn test_prune_keeps_current_window() {
        let store = store(60, 30);
        store.increment("a", at(100)).await;
        assert_eq!(store.prune(at(110)).await, 0);
        assert_eq!(store.tracked_identities().await, 1);
    }

    #[tokio::test]
    async fn test_rejection_after_prune_and_new_window() {
        let store = store(60, 1);
        assert!(store.increment("a", at(10)).await);
        store.prune(at(70)).await;
        assert!(store.increment("a", at(70)).await);
        assert!(!store.increment("a", at(71)).await);
    }

    #[tokio::test]
    async fn test_pre_epoch_clock_falls_into_window_zero() {
        let store = store(60, 1);
        let before_epoch = SystemTime::UNIX_EPOCH - Duration::from_secs(100);
        assert!(store.increment("a", before_epoch).await);
        assert!(!store.increment("a", at(0)).await);
    }

    #[tokio::test]
    async fn test_sweeper_task_spawns_and_aborts() {
        let store = Arc::new(store(60, 30));
        let handle = spawn_sweeper(Arc::clone(&store));
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
