//! Configuration sections.

use crate::error::ConfigError;
use kubesim_resilience::{RateLimitConfig, RetryConfig};
use kubesim_store::{DatabaseType, PoolConfig, StoreBackend};
use kubesim_telemetry::LoggingConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Complete simulator configuration
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SimulatorConfig {
    /// HTTP listener
    #[validate(nested)]
    pub server: ServerSettings,
    /// Backing store selection
    pub database: DatabaseSettings,
    /// Connection pool
    pub pool: PoolConfig,
    /// Retry policy for store operations
    pub retry: RetryConfig,
    /// Admission control on simulated requests
    pub rate_limit: RateLimitConfig,
    /// Response generator
    #[validate(nested)]
    pub generator: GeneratorSettings,
    /// Cache behaviour on the simulate path
    #[validate(nested)]
    pub cache: CacheSettings,
    /// Predefined entries loaded at startup
    pub seed: SeedSettings,
    /// Logging
    pub logging: LoggingConfig,
}

impl SimulatorConfig {
    /// Run field validation and the cross-section checks.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        if self.database.backend() == StoreBackend::Sql {
            let Some(url) = &self.database.url else {
                return Err(ConfigError::Validation(
                    "database.url is required when database.store = \"sql\"".to_string(),
                ));
            };
            if DatabaseType::from_url(url.expose_secret()).is_none() {
                return Err(ConfigError::Validation(
                    "database.url must start with postgres://, postgresql:// or sqlite:".to_string(),
                ));
            }
        }

        if self.pool.min_connections > self.pool.max_connections {
            return Err(ConfigError::Validation(format!(
                "pool.min_connections ({}) exceeds pool.max_connections ({})",
                self.pool.min_connections, self.pool.max_connections
            )));
        }
        if self.pool.max_connections == 0 {
            return Err(ConfigError::Validation(
                "pool.max_connections must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.rate_limit.enabled {
            if self.rate_limit.max_requests == 0 {
                return Err(ConfigError::Validation(
                    "rate_limit.max_requests must be at least 1".to_string(),
                ));
            }
            if self.rate_limit.window.is_zero() {
                return Err(ConfigError::Validation(
                    "rate_limit.window must be positive".to_string(),
                ));
            }
        }

        if let Some(base_url) = &self.generator.base_url {
            url::Url::parse(base_url).map_err(|e| {
                ConfigError::Validation(format!("generator.base_url is not a URL: {e}"))
            })?;
        }

        Ok(())
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind host
    #[validate(length(min = 1))]
    pub host: String,
    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,
    /// Largest accepted request body in bytes
    #[validate(range(min = 1024))]
    pub request_body_limit: usize,
    /// Time allowed for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
    /// Take the client IP from `x-forwarded-for` / `x-real-ip` (behind a proxy)
    pub trust_forwarded_for: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_body_limit: 1024 * 1024,
            shutdown_grace: Duration::from_secs(10),
            trust_forwarded_for: false,
        }
    }
}

impl ServerSettings {
    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Backing store settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL (`postgres://...` or `sqlite:...`)
    pub url: Option<SecretString>,
    /// Explicit backend; inferred from `url` when absent
    pub store: Option<StoreBackend>,
}

impl DatabaseSettings {
    /// Backend to use: the explicit choice, else SQL when a URL is set, else memory.
    #[must_use]
    pub fn backend(&self) -> StoreBackend {
        match (self.store, &self.url) {
            (Some(backend), _) => backend,
            (None, Some(_)) => StoreBackend::Sql,
            (None, None) => StoreBackend::Memory,
        }
    }
}

/// Which generator answers simulated calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Google Gemini
    #[default]
    Gemini,
    /// Deterministic offline payloads
    Echo,
}

impl std::str::FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "echo" => Ok(Self::Echo),
            other => Err(format!("unknown generator '{other}', expected gemini or echo")),
        }
    }
}

/// Generator settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Generator kind
    pub kind: GeneratorKind,
    /// Model name
    #[validate(length(min = 1))]
    pub model: String,
    /// API key; when absent the variable named by `api_key_env` is read
    pub api_key: Option<SecretString>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Sampling temperature
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    /// API base URL override
    pub base_url: Option<String>,
    /// Upstream request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::Gemini,
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            temperature: 0.5,
            base_url: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeneratorSettings {
    /// The configured key, falling back to the `api_key_env` variable.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        self.resolve_api_key_with(|key| std::env::var(key).ok())
    }

    /// [`Self::resolve_api_key`] with an explicit environment lookup
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Option<SecretString>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key
            .clone()
            .filter(|key| !key.expose_secret().is_empty())
            .or_else(|| {
                lookup(&self.api_key_env)
                    .filter(|key| !key.is_empty())
                    .map(SecretString::new)
            })
    }
}

/// Cache behaviour on the simulate path
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct CacheSettings {
    /// Store generated GET responses as owned entries
    pub store_generated: bool,
    /// Owned entries kept by the in-memory store before the oldest are evicted
    #[validate(range(min = 1))]
    pub memory_max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            store_generated: true,
            memory_max_entries: 10_000,
        }
    }
}

/// Predefined entry source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SeedSettings {
    /// Seed file path
    pub path: PathBuf,
    /// Fail startup when the file is missing
    pub required: bool,
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("predefined_cache.json"),
            required: false,
        }
    }
}
