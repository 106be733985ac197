//! # kubesim Config
//!
//! Configuration for the simulator.
//!
//! Settings come from an optional YAML, TOML or JSON file, then environment
//! overrides, then validation:
//!
//! ```no_run
//! use kubesim_config::ConfigLoader;
//!
//! # async fn example() -> Result<(), kubesim_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("kubesim.yaml")
//!     .with_env_prefix("KUBESIM")
//!     .load()
//!     .await?;
//! println!("listening on {}", config.server.bind_address());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;
pub mod seed;

pub use config::{
    CacheSettings, DatabaseSettings, GeneratorKind, GeneratorSettings, SeedSettings,
    ServerSettings, SimulatorConfig,
};
pub use error::ConfigError;
pub use loader::{apply_env_overrides, ConfigLoader};
pub use seed::{load_seed, SeedEntry, SeedFile};
