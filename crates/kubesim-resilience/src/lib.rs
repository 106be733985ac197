//! # kubesim Resilience
//!
//! Resilience patterns for the simulator:
//! - Retry policy with linear backoff and a caller-supplied transient classifier
//! - Dual sliding-window rate limiter keyed by caller token and source IP
//! - Per-request deadlines

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod deadline;
pub mod rate_limit;
pub mod retry;

// Re-export main types
pub use deadline::Deadline;
pub use rate_limit::{Admission, RateLimitConfig, RateLimitScope, RateLimiter};
pub use retry::{RetryConfig, RetryPolicy, RetryPolicyBuilder, RetryResult};
