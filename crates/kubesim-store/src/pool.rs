//! Database connection pool management.

use crate::config::DatabaseType;
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use sqlx::{any::AnyPoolOptions, AnyPool};
use std::time::Duration;
use tracing::{debug, info};

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of connections, baseline plus overflow.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long a caller waits for a free connection.
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// Idle timeout for connections.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// Connections older than this are recycled.
    #[serde(with = "humantime_serde")]
    pub max_lifetime: Duration,
    /// Ping each connection before handing it out.
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 15,
            min_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Single-connection pool. Required for `sqlite::memory:`, where every
    /// connection would otherwise see its own empty database.
    #[must_use]
    pub fn single() -> Self {
        Self {
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        }
    }
}

/// Builder for pool configuration.
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set maximum connections.
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set minimum connections.
    #[must_use]
    pub fn min_connections(mut self, min: u32) -> Self {
        self.config.min_connections = min;
        self
    }

    /// Set acquire timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    /// Set idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set max lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.max_lifetime = lifetime;
        self
    }

    /// Set test before acquire.
    #[must_use]
    pub fn test_before_acquire(mut self, test: bool) -> Self {
        self.config.test_before_acquire = test;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

/// Database connection pool.
#[derive(Clone)]
pub struct DatabasePool {
    pool: AnyPool,
    database_type: DatabaseType,
    max_connections: u32,
}

impl DatabasePool {
    /// Open a pool against `url`.
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self> {
        let database_type = DatabaseType::from_url(url)
            .ok_or_else(|| StoreError::config(format!("Unsupported database URL scheme: {}", redact(url))))?;

        sqlx::any::install_default_drivers();

        // An in-memory SQLite database lives and dies with its one connection
        let in_memory = url.contains(":memory:");
        let mut config = config.clone();
        if in_memory {
            debug!("In-memory SQLite database, pinning a single connection");
            config.max_connections = 1;
            config.min_connections = 1;
        }

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout((!in_memory).then_some(config.idle_timeout))
            .max_lifetime((!in_memory).then_some(config.max_lifetime))
            .test_before_acquire(config.test_before_acquire)
            .connect(url)
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        info!(
            database = %database_type,
            max_connections = config.max_connections,
            "Database pool ready"
        );

        Ok(Self {
            pool,
            database_type,
            max_connections: config.max_connections,
        })
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub fn inner(&self) -> &AnyPool {
        &self.pool
    }

    /// Get the database type.
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max_connections: self.max_connections,
        }
    }

    /// Run a no-op query to prove the database is reachable.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("database_type", &self.database_type)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Strip credentials from a URL before it goes into an error message.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    /// Current number of connections.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum connections allowed.
    pub max_connections: u32,
}

impl PoolStats {
    /// Get the number of active connections.
    #[must_use]
    pub fn active(&self) -> usize {
        (self.size as usize).saturating_sub(self.idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.max_connections, 15);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.max_lifetime, Duration::from_secs(1800));
        assert!(config.test_before_acquire);
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::builder()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .test_before_acquire(false)
            .build();

        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert!(!config.test_before_acquire);
    }

    #[test]
    fn test_redact_hides_credentials() {
        assert_eq!(
            redact("postgres://user:secret@db:5432/kubesim"),
            "postgres://***@db:5432/kubesim"
        );
        assert_eq!(redact("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn test_pool_stats_active() {
        let stats = PoolStats {
            size: 5,
            idle: 3,
            max_connections: 15,
        };
        assert_eq!(stats.active(), 2);
    }

    #[tokio::test]
    async fn test_rejects_unknown_scheme() {
        let err = DatabasePool::connect("mysql://localhost/db", &PoolConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[tokio::test]
    async fn test_memory_sqlite_ping() {
        let pool = DatabasePool::connect("sqlite::memory:", &PoolConfig::default())
            .await
            .unwrap();
        assert_eq!(pool.database_type(), DatabaseType::SQLite);
        assert_eq!(pool.stats().max_connections, 1);
        pool.ping().await.unwrap();
        pool.close().await;
        assert!(pool.is_closed());
    }
}
