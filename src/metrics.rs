//! Prometheus metrics for the gateway
//!
//! Tracks request counts by route and outcome, rate-limit rejections,
//! upstream call latency, and mid-stream aborts. Exposed in Prometheus
//! text format via the `/metrics` endpoint.

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Routed API surface, as a metrics label.
///
/// An enum rather than a free string keeps label cardinality bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chat,
    Feedback,
    Health,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Chat => "chat",
            Route::Feedback => "feedback",
            Route::Health => "health",
        }
    }

    /// Map a request path to its route label, for callers (middleware) that
    /// see the raw URI instead of a typed route.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/api/chat" => Some(Route::Chat),
            "/api/feedback" => Some(Route::Feedback),
            "/health" => Some(Route::Health),
            _ => None,
        }
    }
}

/// How a request ended, as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Invalid,
    RateLimited,
    UpstreamError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Invalid => "invalid",
            Outcome::RateLimited => "rate_limited",
            Outcome::UpstreamError => "upstream_error",
        }
    }
}

/// Which call shape was used against the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    Buffered,
    Streaming,
}

impl CallMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallMode::Buffered => "buffered",
            CallMode::Streaming => "streaming",
        }
    }
}

/// Metrics collector shared across handlers via `AppState`.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: CounterVec,
    rate_limited_total: IntCounter,
    upstream_duration: HistogramVec,
    stream_aborts_total: IntCounter,
}

impl Metrics {
    /// Create a collector with all metrics registered on a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new(
                "codemaster_requests_total",
                "Total API requests by route and outcome",
            ),
            &["route", "outcome"],
        )?;

        let rate_limited_total = IntCounter::with_opts(Opts::new(
            "codemaster_rate_limited_total",
            "Requests rejected by the fixed-window rate limiter",
        ))?;

        let upstream_duration = HistogramVec::new(
            HistogramOpts::new(
                "codemaster_upstream_duration_seconds",
                "Provider call latency in seconds; for streaming, time to an open stream",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["mode"],
        )?;

        let stream_aborts_total = IntCounter::with_opts(Opts::new(
            "codemaster_stream_aborts_total",
            "Streams terminated before the end-of-stream marker was relayed",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;
        registry.register(Box::new(upstream_duration.clone()))?;
        registry.register(Box::new(stream_aborts_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            rate_limited_total,
            upstream_duration,
            stream_aborts_total,
        })
    }

    pub fn record_request(&self, route: Route, outcome: Outcome) {
        self.requests_total
            .with_label_values(&[route.as_str(), outcome.as_str()])
            .inc();
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.inc();
    }

    /// Observe a provider call duration. Non-finite and negative values
    /// corrupt histogram percentiles, so they are logged and dropped.
    pub fn observe_upstream_duration(&self, mode: CallMode, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            tracing::warn!(mode = mode.as_str(), seconds, "dropping invalid duration");
            return;
        }
        self.upstream_duration
            .with_label_values(&[mode.as_str()])
            .observe(seconds);
    }

    pub fn record_stream_abort(&self) {
        self.stream_aborts_total.inc();
    }

    /// Encode all registered metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("metrics encoding produced invalid UTF-8: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registers_all_metric_families() {
        let metrics = Metrics::new().expect("metrics should build");
        metrics.record_request(Route::Chat, Outcome::Success);
        metrics.record_rate_limited();
        metrics.observe_upstream_duration(CallMode::Buffered, 0.2);
        metrics.record_stream_abort();

        let names: Vec<String> = metrics
            .registry
            .gather()
            .iter()
            .map(|family| family.name().to_string())
            .collect();
        assert!(names.contains(&"codemaster_requests_total".to_string()));
        assert!(names.contains(&"codemaster_rate_limited_total".to_string()));
        assert!(names.contains(&"codemaster_upstream_duration_seconds".to_string()));
        assert!(names.contains(&"codemaster_stream_aborts_total".to_string()));
    }

    #[test]
    fn test_request_labels_appear_in_output() {
        let metrics = Metrics::new().expect("metrics should build");
        metrics.record_request(Route::Chat, Outcome::Success);
        metrics.record_request(Route::Chat, Outcome::UpstreamError);
        metrics.record_request(Route::Feedback, Outcome::Success);

        let output = metrics.gather().expect("gather should succeed");
        assert!(output.contains("route=\"chat\""));
        assert!(output.contains("route=\"feedback\""));
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("outcome=\"upstream_error\""));
    }

    #[test]
    fn test_gather_emits_prometheus_text_format() {
        let metrics = Metrics::new().expect("metrics should build");
        metrics.record_request(Route::Health, Outcome::Success);

        let output = metrics.gather().expect("gather should succeed");
        assert!(output.contains("# HELP codemaster_requests_total"));
        assert!(output.contains("# TYPE codemaster_requests_total counter"));
    }

    #[test]
    fn test_clone_shares_the_registry() {
        let metrics = Metrics::new().expect("metrics should build");
        let cloned = metrics.clone();
        metrics.record_rate_limited();

        let output = cloned.gather().expect("gather should succeed");
        assert!(output.contains("codemaster_rate_limited_total 1"));
    }

    #[test]
    fn test_histogram_buckets_cover_slow_calls() {
        let metrics = Metrics::new().expect("metrics should build");
        metrics.observe_upstream_duration(CallMode::Streaming, 0.07);
        metrics.observe_upstream_duration(CallMode::Streaming, 12.0);

        let output = metrics.gather().expect("gather should succeed");
        assert!(output.contains("mode=\"streaming\""));
        assert!(output.contains("le=\"30\""));
        assert!(output.contains("le=\"+Inf\""));
    }

    #[test]
    fn test_invalid_durations_are_dropped() {
        let metrics = Metrics::new().expect("metrics should build");
        metrics.observe_upstream_duration(CallMode::Buffered, f64::NAN);
        metrics.observe_upstream_duration(CallMode::Buffered, f64::INFINITY);
        metrics.observe_upstream_duration(CallMode::Buffered, -1.0);

        let output = metrics.gather().expect("gather should succeed");
        // Histogram families registered with no observations report count 0
        assert!(!output.contains("mode=\"buffered\""));
    }

    #[test]
    fn test_route_from_path() {
        assert_eq!(Route::from_path("/api/chat"), Some(Route::Chat));
        assert_eq!(Route::from_path("/api/feedback"), Some(Route::Feedback));
        assert_eq!(Route::from_path("/health"), Some(Route::Health));
        assert_eq!(Route::from_path("/metrics"), None);
        assert_eq!(Route::from_path("/index.html"), None);
    }

    #[test]
    fn test_label_strings() {
        assert_eq!(Route::Chat.as_str(), "chat");
        assert_eq!(Route::Feedback.as_str(), "feedback");
        assert_eq!(Route::Health.as_str(), "health");
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::Invalid.as_str(), "invalid");
        assert_eq!(Outcome::RateLimited.as_str(), "rate_limited");
        assert_eq!(Outcome::UpstreamError.as_str(), "upstream_error");
        assert_eq!(CallMode::Buffered.as_str(), "buffered");
        assert_eq!(CallMode::Streaming.as_str(), "streaming");
    }

    #[test]
    fn test_concurrent_recording_loses_no_updates() {
        use std::thread;

        let metrics = Arc::new(Metrics::new().expect("metrics should build"));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    metrics.record_request(Route::Chat, Outcome::Success);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        let output = metrics.gather().expect("gather should succeed");
        let line = output
            .lines()
            .find(|line| line.starts_with("codemaster_requests_total{") && line.contains("chat"))
            .expect("chat counter line should exist");
        assert!(line.ends_with(" 800"));
    }
}
