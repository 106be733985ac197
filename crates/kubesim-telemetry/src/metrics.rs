//! Prometheus metrics.
//!
//! Every [`Metrics`] owns its own registry, so tests and multiple servers in
//! one process never collide on metric names.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::fmt;
use std::time::Duration;

/// Result of a cache lookup on the simulate path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from cache
    Hit,
    /// Nothing cached; generated
    Miss,
    /// Lookup failed; generated anyway
    Error,
}

impl CacheOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

/// Simulator metrics
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    rate_limited_total: IntCounterVec,
    cache_lookups_total: IntCounterVec,
    store_retries_total: IntCounter,
    generation_seconds: Histogram,
    generation_failures_total: IntCounterVec,
}

impl Metrics {
    /// Create and register all metrics on a fresh registry
    ///
    /// # Errors
    /// Returns an error if a metric definition is rejected by prometheus
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("kubesim_requests_total", "Requests handled, by route and status"),
            &["route", "status"],
        )?;
        let rate_limited_total = IntCounterVec::new(
            Opts::new("kubesim_rate_limited_total", "Requests rejected by admission control"),
            &["reason"],
        )?;
        let cache_lookups_total = IntCounterVec::new(
            Opts::new("kubesim_cache_lookups_total", "Cache lookups on the simulate path"),
            &["outcome"],
        )?;
        let store_retries_total = IntCounter::new(
            "kubesim_store_retries_total",
            "Store operations retried after a dropped connection",
        )?;
        let generation_seconds = Histogram::with_opts(
            HistogramOpts::new("kubesim_generation_seconds", "Time spent generating responses")
                .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        let generation_failures_total = IntCounterVec::new(
            Opts::new("kubesim_generation_failures_total", "Failed generation calls"),
            &["kind"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;
        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(store_retries_total.clone()))?;
        registry.register(Box::new(generation_seconds.clone()))?;
        registry.register(Box::new(generation_failures_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            rate_limited_total,
            cache_lookups_total,
            store_retries_total,
            generation_seconds,
            generation_failures_total,
        })
    }

    /// Count a finished request
    pub fn record_request(&self, route: &str, status: u16) {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[route, status.as_str()])
            .inc();
    }

    /// Count an admission rejection (`token` or `ip`)
    pub fn record_rate_limited(&self, reason: &str) {
        self.rate_limited_total.with_label_values(&[reason]).inc();
    }

    /// Count a cache lookup
    pub fn record_cache_lookup(&self, outcome: CacheOutcome) {
        self.cache_lookups_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Count a store retry
    pub fn record_store_retry(&self) {
        self.store_retries_total.inc();
    }

    /// Record how long one generation took
    pub fn observe_generation(&self, elapsed: Duration) {
        self.generation_seconds.observe(elapsed.as_secs_f64());
    }

    /// Count a failed generation
    pub fn record_generation_failure(&self, kind: &str) {
        self.generation_failures_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    ///
    /// # Errors
    /// Returns an error if encoding fails
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Content type of [`Metrics::render`] output
    #[must_use]
    pub fn content_type() -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_registries() {
        assert!(Metrics::new().is_ok());
        assert!(Metrics::new().is_ok());
    }

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("/api/*path", 200);
        metrics.record_request("/api/*path", 200);
        metrics.record_rate_limited("ip");
        metrics.record_cache_lookup(CacheOutcome::Hit);
        metrics.record_store_retry();
        metrics.observe_generation(Duration::from_millis(250));

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"kubesim_requests_total{route="/api/*path",status="200"} 2"#));
        assert!(text.contains(r#"kubesim_rate_limited_total{reason="ip"} 1"#));
        assert!(text.contains(r#"kubesim_cache_lookups_total{outcome="hit"} 1"#));
        assert!(text.contains("kubesim_store_retries_total 1"));
        assert!(text.contains("kubesim_generation_seconds_count 1"));
    }

    #[test]
    fn test_content_type() {
        assert!(Metrics::content_type().starts_with("text/plain"));
    }
}
