//! Simulated Kubernetes API calls (`/api/...`, `/apis/...`).
//!
//! Order of work for one call:
//! 1. bearer token (401 before anything else runs)
//! 2. admission control on token and client IP (429)
//! 3. `?timeout` and body validation (400)
//! 4. for GET, the newest owned-or-predefined cache entry for the path
//! 5. on a miss, the generator, bounded by the caller's deadline (408)
//! 6. for GET, write-through of the generated body

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use kubesim_core::{CallerToken, SimError};
use kubesim_providers::GenerationRequest;
use kubesim_resilience::{Admission, Deadline};
use kubesim_telemetry::CacheOutcome;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    error::ApiError,
    extractors::{parse_json_body, CallerAuth, ClientIp},
    state::AppState,
};

/// Response header reporting how the body was produced: `hit`, `miss` or `bypass`
pub const CACHE_HEADER: &str = "x-kubesim-cache";

/// Handler for every simulated API route
#[allow(clippy::too_many_arguments)]
pub async fn simulate(
    State(state): State<AppState>,
    CallerAuth(caller): CallerAuth,
    ClientIp(ip): ClientIp,
    method: Method,
    uri: Uri,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    admit(&state, &caller, &ip)?;

    let path = uri.path().to_string();
    let (query, timeout) = split_query(raw_query.as_deref());
    let deadline = Deadline::from_query(timeout.as_deref())?;

    let mut request = GenerationRequest::new(method.as_str(), path.clone()).with_query(query);
    if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        request = request.with_body(parse_json_body(&headers, &body)?);
    }

    if method != Method::GET {
        let value = generate(&state, &request, &deadline).await?;
        return Ok(with_cache_header(Json(value).into_response(), "bypass"));
    }

    match state.cache.fetch_latest_by_path(&caller, &path).await {
        Ok(entry) => {
            state.metrics.record_cache_lookup(CacheOutcome::Hit);
            debug!(cache_id = %entry.cache_id, path = %path, "Serving cached response");
            let response = (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())],
                entry.response,
            )
                .into_response();
            return Ok(with_cache_header(response, "hit"));
        }
        Err(SimError::NotFound { .. }) => {
            state.metrics.record_cache_lookup(CacheOutcome::Miss);
        }
        Err(e) => {
            state.metrics.record_cache_lookup(CacheOutcome::Error);
            warn!(error = %e, path = %path, "Cache lookup failed, generating instead");
        }
    }

    let value = generate(&state, &request, &deadline).await?;

    if state.store_generated {
        match state
            .cache
            .store(caller, &path, value.to_string(), false)
            .await
        {
            Ok(cache_id) => debug!(cache_id = %cache_id, path = %path, "Stored generated response"),
            Err(e) => warn!(error = %e, path = %path, "Failed to store generated response"),
        }
    }

    Ok(with_cache_header(Json(value).into_response(), "miss"))
}

fn admit(state: &AppState, caller: &CallerToken, ip: &str) -> Result<(), ApiError> {
    match state.limiter.check(&caller.to_string(), ip) {
        Admission::Allowed => Ok(()),
        Admission::Rejected { scope, retry_after } => {
            state.metrics.record_rate_limited(scope.as_str());
            info!(scope = %scope, ip = %ip, "Rate limit exceeded");
            Err(SimError::rate_limited(scope.as_str(), retry_after).into())
        }
    }
}

async fn generate(
    state: &AppState,
    request: &GenerationRequest,
    deadline: &Deadline,
) -> Result<Value, ApiError> {
    let started = Instant::now();
    let result = deadline.run(state.generator.generate(request)).await;

    match result {
        Ok(value) => {
            state.metrics.observe_generation(started.elapsed());
            Ok(value)
        }
        Err(e) => {
            state.metrics.record_generation_failure(e.kind());
            Err(e.into())
        }
    }
}

/// Split the query into generator parameters and the `timeout` control value
fn split_query(raw: Option<&str>) -> (Vec<(String, String)>, Option<String>) {
    let mut timeout = None;
    let params = raw
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .filter(|(key, value)| {
            if key == "timeout" {
                timeout = Some(value.clone());
                false
            } else {
                true
            }
        })
        .collect();
    (params, timeout)
}

fn with_cache_header(mut response: Response, outcome: &'static str) -> Response {
    response
        .headers_mut()
        .insert(CACHE_HEADER, HeaderValue::from_static(outcome));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_query_extracts_timeout() {
        let (params, timeout) = split_query(Some("labelSelector=app%3Dweb&timeout=1.5&limit=10"));
        assert_eq!(
            params,
            vec![
                ("labelSelector".to_string(), "app=web".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
        assert_eq!(timeout.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_split_query_empty() {
        let (params, timeout) = split_query(None);
        assert!(params.is_empty());
        assert!(timeout.is_none());
    }
}
