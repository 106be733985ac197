//! CLI commands module.

pub mod capture;
pub mod health;
pub mod migrate;
pub mod seed;

use anyhow::{Context, Result};
use kubesim_config::{ConfigLoader, SimulatorConfig};
use kubesim_store::{schema, DatabasePool};
use secrecy::ExposeSecret;
use std::path::Path;

/// Load the simulator configuration the server would use.
pub(crate) async fn load_config(path: Option<&Path>) -> Result<SimulatorConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    loader.load().await.context("Failed to load configuration")
}

/// Database URL from the flag, else from configuration.
pub(crate) fn resolve_database_url(flag: Option<String>, config: &SimulatorConfig) -> Result<String> {
    flag.or_else(|| {
        config
            .database
            .url
            .as_ref()
            .map(|url| url.expose_secret().to_string())
    })
    .context("DATABASE_URL environment variable, --database-url or database.url required")
}

/// Connect and make sure the cache table exists.
pub(crate) async fn connect_with_schema(url: &str, config: &SimulatorConfig) -> Result<DatabasePool> {
    let pool = DatabasePool::connect(url, &config.pool)
        .await
        .context("Failed to connect to database")?;
    schema::ensure_schema(&pool)
        .await
        .context("Failed to create schema")?;
    Ok(pool)
}
