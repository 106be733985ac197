//! Generator abstraction.

use async_trait::async_trait;
use kubesim_core::SimResult;
use serde_json::Value;

/// One simulated API call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// HTTP method, upper case
    pub method: String,
    /// Full request path, including the `/api` or `/apis` prefix
    pub path: String,
    /// Query parameters in request order
    pub query: Vec<(String, String)>,
    /// Parsed JSON body for POST, PUT and PATCH
    pub body: Option<Value>,
}

impl GenerationRequest {
    /// Request with no query and no body
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Attach query parameters
    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Produces a plausible response for a simulated call.
///
/// Implementations return parsed JSON. Output that cannot be turned into JSON
/// is a [`kubesim_core::SimError::Generation`] and must not be retried by the
/// caller.
#[async_trait]
pub trait ResponseGenerator: Send + Sync + std::fmt::Debug {
    /// Generate a response body
    async fn generate(&self, request: &GenerationRequest) -> SimResult<Value>;

    /// Short name for logs and metrics
    fn name(&self) -> &'static str;
}
