//! # kubesim-telemetry
//!
//! Observability for the simulator.
//!
//! This crate provides:
//! - Structured logging setup on top of `tracing-subscriber`
//! - Prometheus metrics for requests, admission control, cache and store

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use metrics::{CacheOutcome, Metrics};
