//! # kubesim
//!
//! Kubernetes API simulator. Answers `/api` and `/apis` calls from a
//! per-caller response cache, falling back to a generative model, so clients
//! can be exercised without a real cluster.
//!
//! ## Usage
//!
//! ```bash
//! # In-memory store, echo generator when no GOOGLE_API_KEY is set
//! kubesim
//!
//! # Custom config file
//! KUBESIM_CONFIG=/etc/kubesim.yaml kubesim
//!
//! # Environment overrides
//! KUBESIM_PORT=9000 DATABASE_URL=postgres://localhost/kubesim kubesim
//! ```

use anyhow::{Context, Result};
use kubesim_config::{load_seed, ConfigLoader, GeneratorKind, SimulatorConfig};
use kubesim_providers::{EchoGenerator, GeminiConfig, GeminiGenerator, ResponseGenerator};
use kubesim_resilience::{RateLimiter, RetryPolicy};
use kubesim_server::{shutdown_signal, AppState, Server, ServerConfig};
use kubesim_store::{schema, CacheService, DatabasePool, MemoryCacheStore, SqlCacheStore, StoreBackend};
use kubesim_telemetry::{init_logging, Metrics};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Application entry point
#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        // Logging may not be up if configuration failed
        eprintln!("kubesim failed: {e:#}");
        error!(error = %format!("{e:#}"), "Application failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let mut loader = ConfigLoader::new();
    if let Ok(path) = std::env::var("KUBESIM_CONFIG") {
        loader = loader.with_file(path);
    }
    let config = loader.load().await.context("Failed to load configuration")?;

    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.server.bind_address(),
        "Starting kubesim"
    );

    let metrics = Metrics::new().context("Failed to create metrics registry")?;

    let (cache, pool) = open_store(&config, &metrics).await?;

    let seed = load_seed(&config.seed).await.context("Failed to load seed file")?;
    if !seed.is_empty() {
        cache
            .seed_predefined(seed.into_pairs())
            .await
            .context("Failed to seed predefined entries")?;
    }

    let generator = create_generator(&config)?;
    info!(generator = generator.name(), "Generator ready");

    let state = AppState::builder()
        .cache(cache)
        .rate_limiter(RateLimiter::new(config.rate_limit.clone()))
        .generator(generator)
        .metrics(metrics)
        .store_generated(config.cache.store_generated)
        .trust_forwarded_for(config.server.trust_forwarded_for)
        .body_limit(config.server.request_body_limit)
        .build()?;

    let server = Server::new(ServerConfig::from(&config.server), state);
    let served = server
        .run(async {
            shutdown_signal().await;
        })
        .await;

    if let Some(pool) = pool {
        pool.close().await;
        info!("Database pool closed");
    }

    served.context("Server failed")
}

/// Open the configured backend. The pool is returned so it can be closed on exit.
async fn open_store(
    config: &SimulatorConfig,
    metrics: &Metrics,
) -> Result<(CacheService, Option<DatabasePool>)> {
    match config.database.backend() {
        StoreBackend::Memory => {
            let max_entries = config.cache.memory_max_entries;
            warn!(
                max_entries,
                "Using the in-memory store; cached responses are lost on restart and the oldest owned entries are evicted past max_entries"
            );
            let store = MemoryCacheStore::new().with_max_entries(max_entries);
            Ok((CacheService::new(Arc::new(store)), None))
        }
        StoreBackend::Sql => {
            let url = config
                .database
                .url
                .as_ref()
                .context("database.url is required for the sql store")?;

            let pool = DatabasePool::connect(url.expose_secret(), &config.pool)
                .await
                .context("Failed to connect to database")?;
            pool.ping().await.context("Database ping failed")?;
            schema::ensure_schema(&pool)
                .await
                .context("Failed to create schema")?;

            let retry_metrics = metrics.clone();
            let retry = RetryPolicy::new(config.retry.clone())
                .with_retry_hook(move |_attempt| retry_metrics.record_store_retry());
            let store = SqlCacheStore::new(pool.clone(), retry);

            Ok((CacheService::new(Arc::new(store)), Some(pool)))
        }
    }
}

/// Gemini when a key is available, else the echo generator.
fn create_generator(config: &SimulatorConfig) -> Result<Arc<dyn ResponseGenerator>> {
    let settings = &config.generator;
    if settings.kind == GeneratorKind::Echo {
        return Ok(Arc::new(EchoGenerator::new()));
    }

    let Some(api_key) = settings.resolve_api_key() else {
        warn!(
            env = %settings.api_key_env,
            "No Gemini API key configured, falling back to the echo generator"
        );
        return Ok(Arc::new(EchoGenerator::new()));
    };

    let mut gemini = GeminiConfig::new(api_key.expose_secret().as_str())
        .with_model(&settings.model)
        .with_temperature(settings.temperature)
        .with_timeout(settings.timeout);
    if let Some(base_url) = &settings.base_url {
        gemini = gemini.with_base_url(base_url);
    }

    let generator = GeminiGenerator::new(gemini).context("Failed to create Gemini generator")?;
    info!(model = generator.model(), "Using Gemini generator");
    Ok(Arc::new(generator))
}
