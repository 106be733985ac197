//! HTTP request handlers.

mod cache;
mod meta;
mod simulate;

pub use cache::{create_entry, delete_entry, get_entry, list_entries, lookup_entry, CacheView};
pub use meta::{
    details, health_check, metrics_endpoint, method_not_allowed, not_found, readiness_check,
    welcome, HealthResponse,
};
pub use simulate::{simulate, CACHE_HEADER};
