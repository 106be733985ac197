//! # kubesim Core
//!
//! Core types and error handling shared by every kubesim crate.
//!
//! This crate provides:
//! - Caller and cache identifiers (newtypes over UUIDs)
//! - The cache entry record and the rule deciding which entry a caller sees
//! - The error taxonomy and its HTTP status mapping

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use cache::{newest_first, select_latest, CacheEntry, NewCacheEntry};
pub use error::{SimError, SimResult};
pub use types::{CacheId, CallerToken};
