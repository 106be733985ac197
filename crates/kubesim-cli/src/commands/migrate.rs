//! Migrate command - cache table setup.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;

use crate::output::{CommandResult, OutputFormat};

/// Arguments for the migrate command.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Database URL (`postgres://...` or `sqlite:...`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Migration output.
#[derive(Debug, Serialize)]
pub struct MigrateOutput {
    /// Database kind
    pub database: String,
    /// Table that was created or verified
    pub table: &'static str,
    /// Statements executed
    pub statements: usize,
}

/// Execute the migrate command.
pub async fn execute(args: MigrateArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let format = OutputFormat::from_json_flag(json);
    let config = super::load_config(config_path).await?;
    let url = super::resolve_database_url(args.database_url, &config)?;

    let pool = super::connect_with_schema(&url, &config).await?;
    let database = pool.database_type();
    pool.close().await;

    let output = MigrateOutput {
        database: database.to_string(),
        table: kubesim_store::schema::CACHE_TABLE,
        statements: kubesim_store::schema::statements(database).len(),
    };
    let message = format!("Schema ready ({} on {})", output.table, output.database);
    CommandResult::success(output, message).print(format)
}
