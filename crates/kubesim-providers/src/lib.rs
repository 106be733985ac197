//! # kubesim-providers
//!
//! Response generators for simulated Kubernetes API calls.
//!
//! This crate provides:
//! - The [`ResponseGenerator`] trait the server calls on a cache miss
//! - [`GeminiGenerator`], backed by the Google AI Studio `generateContent` API
//! - [`EchoGenerator`], a deterministic offline generator
//! - Prompt construction and cleanup of model output into JSON

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cleanup;
pub mod echo;
pub mod gemini;
pub mod generator;
pub mod prompt;

pub use echo::EchoGenerator;
pub use gemini::{GeminiConfig, GeminiGenerator};
pub use generator::{GenerationRequest, ResponseGenerator};
