//! Seed command - load predefined cache entries.

use anyhow::{Context, Result};
use clap::Args;
use kubesim_config::SeedFile;
use kubesim_resilience::RetryPolicy;
use kubesim_store::{CacheService, SqlCacheStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the seed command.
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Seed file; defaults to `seed.path` from configuration
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Database URL (`postgres://...` or `sqlite:...`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Seeding output.
#[derive(Debug, Serialize)]
pub struct SeedOutput {
    /// File that was read
    pub file: PathBuf,
    /// Entries in the file
    pub entries: usize,
    /// Entries written
    pub inserted: usize,
    /// Paths that already had a predefined entry
    pub skipped: usize,
}

/// Execute the seed command.
pub async fn execute(args: SeedArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let format = OutputFormat::from_json_flag(json);
    let config = super::load_config(config_path).await?;
    let url = super::resolve_database_url(args.database_url, &config)?;
    let file = args.file.unwrap_or_else(|| config.seed.path.clone());

    let seed = SeedFile::read(&file)
        .await
        .with_context(|| format!("Failed to read seed file {}", file.display()))?;
    if seed.is_empty() {
        output::warning(&format!("{} has no entries", file.display()));
    }
    let entries = seed.len();

    let pool = super::connect_with_schema(&url, &config).await?;
    let store = SqlCacheStore::new(pool.clone(), RetryPolicy::new(config.retry.clone()));
    let service = CacheService::new(Arc::new(store));

    let report = service.seed_predefined(seed.into_pairs()).await;
    pool.close().await;
    let report = report.context("Seeding failed")?;

    let message = format!(
        "Seeded {} predefined entries ({} already present)",
        report.inserted, report.skipped
    );
    CommandResult::success(
        SeedOutput {
            file,
            entries,
            inserted: report.inserted,
            skipped: report.skipped,
        },
        message,
    )
    .print(format)
}
