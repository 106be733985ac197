//! Deterministic offline generator.
//!
//! Produces a fixed-shape acknowledgement per method instead of calling a
//! model. Used for local development and when no Gemini key is configured.

use crate::generator::{GenerationRequest, ResponseGenerator};
use async_trait::async_trait;
use chrono::Utc;
use kubesim_core::SimResult;
use serde_json::{json, Map, Value};

/// Echo generator
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGenerator;

impl EchoGenerator {
    /// Create a new echo generator
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn verb(method: &str) -> &'static str {
        match method {
            "POST" => "created",
            "PUT" => "updated",
            "PATCH" => "patched",
            "DELETE" => "deleted",
            _ => "retrieved",
        }
    }
}

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(&self, request: &GenerationRequest) -> SimResult<Value> {
        let mut payload = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "path": request.path,
            "method": request.method,
            "message": format!(
                "Successfully {} resource at {}",
                Self::verb(&request.method),
                request.path
            ),
        });

        match request.method.as_str() {
            "GET" => {
                let query: Map<String, Value> = request
                    .query
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                payload["query_params"] = Value::Object(query);
            }
            "POST" | "PUT" | "PATCH" => {
                payload["data"] = request.body.clone().unwrap_or(Value::Null);
            }
            _ => {}
        }

        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}
