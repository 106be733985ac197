//! Configuration loading.

use crate::config::{GeneratorKind, SimulatorConfig};
use crate::error::ConfigError;
use kubesim_store::StoreBackend;
use kubesim_telemetry::LogFormat;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Loads [`SimulatorConfig`] from a file and the environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader with no file and the `KUBESIM` prefix
    #[must_use]
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: "KUBESIM".to_string(),
            use_env: true,
        }
    }

    /// Read this file first
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Prefix for environment overrides (`<PREFIX>_PORT`, ...)
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip environment overrides
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load, override and validate.
    pub async fn load(&self) -> Result<SimulatorConfig, ConfigError> {
        let mut config = match &self.file {
            Some(path) => Self::load_file(path).await?,
            None => SimulatorConfig::default(),
        };

        if self.use_env {
            apply_env_overrides(&mut config, &self.env_prefix, |key| std::env::var(key).ok())?;
        }

        config.check()?;
        Ok(config)
    }

    async fn load_file(path: &Path) -> Result<SimulatorConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "Loading configuration file");
        Self::parse(path, &content)
    }

    /// Parse file content, choosing the format by extension.
    pub fn parse(path: &Path, content: &str) -> Result<SimulatorConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            "toml" => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            "json" => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Apply environment overrides.
///
/// Prefixed keys: `_HOST`, `_PORT`, `_TRUST_FORWARDED_FOR`, `_STORE`, `_RATE_LIMIT`, `_RATE_LIMIT_ENABLED`,
/// `_LOG_LEVEL`, `_LOG_FORMAT`, `_GENERATOR`, `_MODEL`, `_SEED_FILE`.
/// Unprefixed keys: `DATABASE_URL`, `LLM_TEMPERATURE`.
pub fn apply_env_overrides<F>(
    config: &mut SimulatorConfig,
    prefix: &str,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| {
        let key = format!("{prefix}_{suffix}");
        lookup(&key).map(|value| (key, value))
    };

    if let Some((_, host)) = var("HOST") {
        config.server.host = host;
    }
    if let Some((key, port)) = var("PORT") {
        config.server.port = parse(&key, &port)?;
    }
    if let Some((key, trust)) = var("TRUST_FORWARDED_FOR") {
        config.server.trust_forwarded_for = parse(&key, &trust)?;
    }
    if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
        config.database.url = Some(SecretString::new(url));
    }
    if let Some((key, store)) = var("STORE") {
        config.database.store = Some(match store.to_ascii_lowercase().as_str() {
            "sql" => StoreBackend::Sql,
            "memory" => StoreBackend::Memory,
            _ => return Err(ConfigError::env(key, "expected sql or memory")),
        });
    }
    if let Some((key, limit)) = var("RATE_LIMIT") {
        config.rate_limit.max_requests = parse(&key, &limit)?;
    }
    if let Some((key, enabled)) = var("RATE_LIMIT_ENABLED") {
        config.rate_limit.enabled = parse(&key, &enabled)?;
    }
    if let Some((_, level)) = var("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some((key, format)) = var("LOG_FORMAT") {
        config.logging.format = match format.to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => return Err(ConfigError::env(key, "expected pretty or json")),
        };
    }
    if let Some((key, kind)) = var("GENERATOR") {
        config.generator.kind =
            GeneratorKind::from_str(&kind).map_err(|e| ConfigError::env(key, e))?;
    }
    if let Some((_, model)) = var("MODEL") {
        config.generator.model = model;
    }
    if let Some(temperature) = lookup("LLM_TEMPERATURE") {
        config.generator.temperature = parse("LLM_TEMPERATURE", &temperature)?;
    }
    if let Some((_, path)) = var("SEED_FILE") {
        config.seed.path = PathBuf::from(path);
    }

    Ok(())
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::env(key, format!("'{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn file_with(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let file = file_with(
            ".yaml",
            r#"
server:
  port: 8088
pool:
  max_connections: 4
  min_connections: 1
  acquire_timeout: 5s
retry:
  max_attempts: 5
  base_delay: 2s
rate_limit:
  max_requests: 60
  window: 1m
generator:
  kind: echo
logging:
  level: debug
  format: json
"#,
        );

        let config = ConfigLoader::new()
            .with_file(file.path())
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.pool.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.base_delay, Duration::from_secs(2));
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.rate_limit.max_requests, 60);
        assert_eq!(config.generator.kind, GeneratorKind::Echo);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[tokio::test]
    async fn test_load_toml() {
        let file = file_with(
            ".toml",
            r#"
[server]
host = "127.0.0.1"

[database]
url = "sqlite::memory:"

[seed]
path = "seeds/discovery.json"
required = true
"#,
        );

        let config = ConfigLoader::new()
            .with_file(file.path())
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.server.bind_address(), "127.0.0.1:5000");
        assert_eq!(config.database.backend(), StoreBackend::Sql);
        assert!(config.seed.required);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/kubesim.yaml")
            .without_env()
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn test_invalid_values_fail_validation() {
        let file = file_with(".json", r#"{"retry": {"max_attempts": 0}}"#);
        let err = ConfigLoader::new()
            .with_file(file.path())
            .without_env()
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigLoader::parse(Path::new("kubesim.ini"), "").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ConfigLoader::parse(Path::new("k.yaml"), "server: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("KUBESIM_HOST", "127.0.0.1"),
            ("KUBESIM_PORT", "9000"),
            ("DATABASE_URL", "postgres://sim:pw@localhost/sim"),
            ("KUBESIM_RATE_LIMIT", "60"),
            ("KUBESIM_LOG_LEVEL", "debug"),
            ("KUBESIM_LOG_FORMAT", "json"),
            ("KUBESIM_GENERATOR", "echo"),
            ("LLM_TEMPERATURE", "0.9"),
            ("KUBESIM_SEED_FILE", "/etc/kubesim/seed.json"),
        ]);

        let mut config = SimulatorConfig::default();
        apply_env_overrides(&mut config, "KUBESIM", |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.server.bind_address(), "127.0.0.1:9000");
        assert_eq!(
            config.database.url.as_ref().unwrap().expose_secret(),
            "postgres://sim:pw@localhost/sim"
        );
        assert_eq!(config.database.backend(), StoreBackend::Sql);
        assert_eq!(config.rate_limit.max_requests, 60);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.generator.kind, GeneratorKind::Echo);
        assert!((config.generator.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.seed.path, PathBuf::from("/etc/kubesim/seed.json"));
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_env_custom_prefix() {
        let vars = env(&[("SIM_PORT", "7000"), ("KUBESIM_PORT", "1")]);
        let mut config = SimulatorConfig::default();
        apply_env_overrides(&mut config, "SIM", |k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_env_bad_values() {
        let mut config = SimulatorConfig::default();

        let vars = env(&[("KUBESIM_PORT", "eighty")]);
        let err = apply_env_overrides(&mut config, "KUBESIM", |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref key, .. } if key == "KUBESIM_PORT"));

        let vars = env(&[("KUBESIM_STORE", "redis")]);
        assert!(apply_env_overrides(&mut config, "KUBESIM", |k| vars.get(k).cloned()).is_err());
    }
}
