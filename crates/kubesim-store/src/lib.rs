//! # kubesim-store
//!
//! Persistence for simulated responses.
//!
//! This crate provides:
//! - The [`CacheStore`] trait and its SQL and in-memory backends
//! - Connection pooling with liveness probing
//! - Schema creation for PostgreSQL and SQLite
//! - [`CacheService`], which applies ownership and precedence rules on top
//!   of any backend
//!
//! ## Example
//!
//! ```rust,no_run
//! use kubesim_store::{CacheService, DatabasePool, PoolConfig, SqlCacheStore};
//! use kubesim_resilience::RetryPolicy;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = DatabasePool::connect("sqlite::memory:", &PoolConfig::default()).await?;
//!     kubesim_store::schema::ensure_schema(&pool).await?;
//!
//!     let store = SqlCacheStore::new(pool, RetryPolicy::with_defaults());
//!     let service = CacheService::new(Arc::new(store));
//!     service.ping().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod memory;
pub mod pool;
pub mod schema;
pub mod service;
pub mod sql;
pub mod store;

pub use config::{DatabaseType, StoreBackend};
pub use error::{Result, StoreError};
pub use memory::MemoryCacheStore;
pub use pool::{DatabasePool, PoolConfig, PoolConfigBuilder, PoolStats};
pub use service::{CacheService, SeedReport};
pub use sql::SqlCacheStore;
pub use store::CacheStore;
