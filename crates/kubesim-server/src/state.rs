//! Shared application state.

use kubesim_core::{SimError, SimResult};
use kubesim_providers::{EchoGenerator, ResponseGenerator};
use kubesim_resilience::{RateLimitConfig, RateLimiter};
use kubesim_store::{CacheService, MemoryCacheStore};
use kubesim_telemetry::Metrics;
use std::sync::Arc;
use std::time::Instant;

/// Body limit used when none is configured
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Cache operations
    pub cache: CacheService,
    /// Admission control for simulated calls
    pub limiter: Arc<RateLimiter>,
    /// Generator used on cache misses
    pub generator: Arc<dyn ResponseGenerator>,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Store generated GET responses for the caller
    pub store_generated: bool,
    /// Read the client IP from forwarding headers
    pub trust_forwarded_for: bool,
    /// Largest accepted request body in bytes
    pub body_limit: usize,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Start building state
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Seconds since the state was built
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.cache.backend())
            .field("generator", &self.generator.name())
            .field("rate_limit", self.limiter.config())
            .field("store_generated", &self.store_generated)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AppState`].
///
/// Anything not set falls back to an in-memory store, the echo generator,
/// the default rate limit and a fresh metrics registry.
#[derive(Default)]
pub struct AppStateBuilder {
    cache: Option<CacheService>,
    limiter: Option<Arc<RateLimiter>>,
    generator: Option<Arc<dyn ResponseGenerator>>,
    metrics: Option<Metrics>,
    store_generated: Option<bool>,
    trust_forwarded_for: bool,
    body_limit: Option<usize>,
}

impl AppStateBuilder {
    /// Set the cache service
    #[must_use]
    pub fn cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the rate limiter
    #[must_use]
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(Arc::new(limiter));
        self
    }

    /// Set the rate limit configuration
    #[must_use]
    pub fn rate_limit(self, config: RateLimitConfig) -> Self {
        self.rate_limiter(RateLimiter::new(config))
    }

    /// Set the generator
    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enable or disable write-through of generated responses
    #[must_use]
    pub fn store_generated(mut self, enabled: bool) -> Self {
        self.store_generated = Some(enabled);
        self
    }

    /// Trust `x-forwarded-for` / `x-real-ip`
    #[must_use]
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Set the request body limit
    #[must_use]
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    /// Build the state
    ///
    /// # Errors
    /// Returns an error if the default metrics registry cannot be created
    pub fn build(self) -> SimResult<AppState> {
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Metrics::new()
                .map_err(|e| SimError::internal(format!("Failed to create metrics: {e}")))?,
        };

        Ok(AppState {
            cache: self
                .cache
                .unwrap_or_else(|| CacheService::new(Arc::new(MemoryCacheStore::new()))),
            limiter: self
                .limiter
                .unwrap_or_else(|| Arc::new(RateLimiter::default())),
            generator: self
                .generator
                .unwrap_or_else(|| Arc::new(EchoGenerator::new())),
            metrics,
            store_generated: self.store_generated.unwrap_or(true),
            trust_forwarded_for: self.trust_forwarded_for,
            body_limit: self.body_limit.unwrap_or(DEFAULT_BODY_LIMIT),
            started_at: Instant::now(),
        })
    }
}
