//! # kubesim Server
//!
//! HTTP surface of the Kubernetes API simulator.
//!
//! This crate provides:
//! - Axum routes for simulated `/api` and `/apis` calls
//! - Cache management endpoints
//! - Admission control, request deadlines and error mapping
//! - Health, readiness and Prometheus metrics endpoints
//! - Graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

pub use error::ApiError;
pub use handlers::{CacheView, HealthResponse, CACHE_HEADER};
pub use routes::create_router;
pub use server::{Server, ServerConfig};
pub use shutdown::{shutdown_signal, ShutdownTrigger};
pub use state::{AppState, AppStateBuilder};
