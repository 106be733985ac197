//! HTTP error responses.
//!
//! Every failure leaves the server as `{"error": <message>}`, optionally with
//! a `details` field. Internal failures are logged in full and reported to the
//! caller with a generic message only.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kubesim_core::SimError;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::error;

/// API error returned by handlers and extractors
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Short message rendered as `error`
    pub message: String,
    /// Optional extra context rendered as `details`
    pub details: Option<Value>,
    /// Seconds for the `retry-after` header
    pub retry_after: Option<Duration>,
}

impl ApiError {
    /// Create an error with a status and message
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            retry_after: None,
        }
    }

    /// Attach details
    #[must_use]
    pub fn with_details(mut self, details: impl Into<Value>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// 400 with the reason in `details`
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request").with_details(details.into())
    }

    /// 401
    pub fn unauthorized(details: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized").with_details(details.into())
    }

    /// 403
    pub fn forbidden(details: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden").with_details(details.into())
    }

    /// 404
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    /// 405
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    /// 500 with a generic message
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    /// 503
    pub fn service_unavailable(details: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").with_details(details.into())
    }
}

impl From<SimError> for ApiError {
    fn from(err: SimError) -> Self {
        match err {
            SimError::Validation { message } => Self::bad_request(message),
            SimError::Unauthorized { message } => Self::unauthorized(message),
            SimError::Forbidden { message } => Self::forbidden(message),
            SimError::NotFound { .. } => Self::not_found(),
            SimError::RateLimited { scope, retry_after } => {
                let mut api = Self::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")
                    .with_details(scope);
                api.retry_after = Some(retry_after);
                api
            }
            SimError::Timeout { after } => Self::new(StatusCode::REQUEST_TIMEOUT, "Request timed out")
                .with_details(format!("No response within {:.3}s", after.as_secs_f64())),
            other => {
                error!(kind = other.kind(), error = %other, "Request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.message });
        if let Some(details) = self.details {
            body["details"] = details;
        }

        let mut response = (self.status, Json(body)).into_response();

        if let Some(retry_after) = self.retry_after {
            // Round up so clients never retry early
            let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&seconds.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}
