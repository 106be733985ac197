//! CLI argument definitions using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;

/// kubesim operator tool
#[derive(Parser, Debug)]
#[command(name = "kubesim-admin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Simulator configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "KUBESIM_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the cache table and indexes
    Migrate(commands::migrate::MigrateArgs),

    /// Load predefined cache entries from a seed file
    Seed(commands::seed::SeedArgs),

    /// Capture discovery responses from a real cluster into a seed file
    Capture(commands::capture::CaptureArgs),

    /// Check a running simulator
    Health(commands::health::HealthArgs),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = self.config.as_deref();
        match self.command {
            Commands::Migrate(args) => commands::migrate::execute(args, config, self.json).await,
            Commands::Seed(args) => commands::seed::execute(args, config, self.json).await,
            Commands::Capture(args) => commands::capture::execute(args, self.json).await,
            Commands::Health(args) => commands::health::execute(args, self.json).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_capture() {
        let cli = Cli::try_parse_from([
            "kubesim-admin",
            "capture",
            "--endpoint",
            "https://10.0.0.1",
            "--token",
            "abc",
            "--insecure",
        ])
        .unwrap();
        match cli.command {
            Commands::Capture(args) => {
                assert!(args.insecure);
                assert_eq!(args.out, PathBuf::from("predefined_cache.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
