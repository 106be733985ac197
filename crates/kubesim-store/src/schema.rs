//! Table layout for cached responses.
//!
//! Identifiers are stored as text and `created_at` as microseconds since the
//! Unix epoch, so the same queries run unchanged on both backends through the
//! `Any` driver. `is_predefined` is 0 or 1.

use crate::config::DatabaseType;
use crate::error::Result;
use crate::pool::DatabasePool;
use tracing::info;

/// Table holding every cache entry.
pub const CACHE_TABLE: &str = "api_cache";

const POSTGRES_SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS api_cache (
        id BIGSERIAL PRIMARY KEY,
        cache_id VARCHAR(36) NOT NULL UNIQUE,
        user_token VARCHAR(36),
        api_path TEXT NOT NULL,
        response TEXT NOT NULL,
        is_predefined SMALLINT NOT NULL DEFAULT 0,
        created_at BIGINT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_api_cache_path_created ON api_cache(api_path, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_api_cache_user_token ON api_cache(user_token)",
];

const SQLITE_SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS api_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cache_id TEXT NOT NULL UNIQUE,
        user_token TEXT,
        api_path TEXT NOT NULL,
        response TEXT NOT NULL,
        is_predefined SMALLINT NOT NULL DEFAULT 0,
        created_at BIGINT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_api_cache_path_created ON api_cache(api_path, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_api_cache_user_token ON api_cache(user_token)",
];

/// DDL statements for the given database, in execution order.
#[must_use]
pub fn statements(database_type: DatabaseType) -> &'static [&'static str] {
    match database_type {
        DatabaseType::PostgreSQL => POSTGRES_SCHEMA,
        DatabaseType::SQLite => SQLITE_SCHEMA,
    }
}

/// Create the cache table and its indexes if they do not exist yet.
pub async fn ensure_schema(pool: &DatabasePool) -> Result<()> {
    let mut tx = pool.inner().begin().await?;
    for statement in statements(pool.database_type()) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!(table = CACHE_TABLE, database = %pool.database_type(), "Schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;

    #[test]
    fn test_each_backend_creates_the_table() {
        for db in [DatabaseType::PostgreSQL, DatabaseType::SQLite] {
            let stmts = statements(db);
            assert!(stmts[0].contains("CREATE TABLE IF NOT EXISTS api_cache"));
            assert!(stmts.iter().all(|s| s.contains("IF NOT EXISTS")));
        }
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let pool = DatabasePool::connect("sqlite::memory:", &PoolConfig::single())
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        sqlx::query("SELECT COUNT(*) FROM api_cache")
            .execute(pool.inner())
            .await
            .unwrap();
    }
}
