//! Service endpoints: welcome, request details, health, metrics and fallbacks.

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use kubesim_telemetry::Metrics;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{error, warn};

use crate::{
    error::ApiError,
    extractors::{is_json_content_type, ClientIp},
    state::AppState,
};

/// `GET /`
pub async fn welcome() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Kubernetes API simulator",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/": "This overview",
            "/details": "Echo of the request as the server saw it (any method)",
            "/api/<path>": "Simulated core API (GET, POST, PUT, PATCH, DELETE; bearer token required)",
            "/apis/<path>": "Simulated API groups (GET; bearer token required)",
            "/cache": "List (GET) or store (POST) cached responses",
            "/cache/lookup?api_path=<path>": "Entry a caller would be served for a path (token optional)",
            "/cache/<cache_id>": "Fetch (GET) or delete (DELETE) a cached response",
            "/healthz": "Liveness",
            "/readyz": "Readiness, including the backing store",
            "/metrics": "Prometheus metrics"
        }
    }))
}

/// `ANY /details`
pub async fn details(
    ClientIp(remote_addr): ClientIp,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let header_map: BTreeMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let query: Map<String, Value> = uri
        .query()
        .map(|q| form_pairs(q.as_bytes()))
        .unwrap_or_default();

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let form = content_type
        .filter(|ct| ct.starts_with(mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()))
        .map(|_| form_pairs(&body))
        .unwrap_or_default();

    let json_body = if is_json_content_type(&headers) {
        serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null)
    } else {
        Value::Null
    };

    let bearer_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    Json(json!({
        "method": method.as_str(),
        "url": uri.to_string(),
        "path": uri.path(),
        "headers": header_map,
        "query_params": query,
        "form_data": form,
        "json": json_body,
        "bearer_token": bearer_token,
        "content_type": content_type,
        "content_length": body.len(),
        "remote_addr": remote_addr,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

fn form_pairs(input: &[u8]) -> Map<String, Value> {
    url::form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
}

/// `GET /healthz`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// `GET /readyz`: ready when the backing store answers a ping
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.cache.ping().await {
        Ok(()) => Ok(Json(json!({
            "status": "ready",
            "store": state.cache.backend(),
        }))),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            Err(ApiError::service_unavailable("Backing store unavailable"))
        }
    }
}

/// `GET /metrics` (Prometheus text format)
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, Metrics::content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            ApiError::internal().into_response()
        }
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::not_found()
}

/// Fallback for known routes called with an unsupported method
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
