//! Cache management endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use kubesim_core::{CacheEntry, CacheId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::{
    error::ApiError,
    extractors::{CallerAuth, JsonBody, OptionalCaller},
    state::AppState,
};

/// Cache entry as returned to callers. The internal id and owner are not exposed.
#[derive(Debug, Serialize)]
pub struct CacheView {
    /// External id
    pub cache_id: CacheId,
    /// Path the response answers
    pub api_path: String,
    /// Stored response, verbatim
    pub response: String,
    /// Seeded by the operator
    pub is_predefined: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl From<CacheEntry> for CacheView {
    fn from(entry: CacheEntry) -> Self {
        Self {
            cache_id: entry.cache_id,
            api_path: entry.api_path,
            response: entry.response,
            is_predefined: entry.is_predefined,
            created_at: entry.created_at,
        }
    }
}

/// Body of `POST /cache`
#[derive(Debug, Deserialize)]
pub struct CreateCacheRequest {
    /// Path the response answers
    pub api_path: String,
    /// JSON string stored verbatim, or any other JSON value stored serialized
    pub response: Value,
    /// Callers may not set this; `true` is rejected
    #[serde(default)]
    pub is_predefined: bool,
}

/// `POST /cache`
#[instrument(skip_all, fields(caller = %caller))]
pub async fn create_entry(
    State(state): State<AppState>,
    CallerAuth(caller): CallerAuth,
    JsonBody(body): JsonBody<CreateCacheRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let response = match body.response {
        Value::String(text) => text,
        other => other.to_string(),
    };

    let cache_id = state
        .cache
        .store(caller, &body.api_path, response, body.is_predefined)
        .await?;

    info!(cache_id = %cache_id, api_path = %body.api_path, "Cache entry created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Cache entry created",
            "cache_id": cache_id,
        })),
    ))
}

/// `GET /cache`: owned and predefined entries, newest first
pub async fn list_entries(
    State(state): State<AppState>,
    CallerAuth(caller): CallerAuth,
) -> Result<Json<Vec<CacheView>>, ApiError> {
    let entries = state.cache.fetch_all(&caller).await?;
    Ok(Json(entries.into_iter().map(CacheView::from).collect()))
}

/// `GET /cache/:cache_id`
pub async fn get_entry(
    State(state): State<AppState>,
    CallerAuth(caller): CallerAuth,
    Path(cache_id): Path<String>,
) -> Result<Json<CacheView>, ApiError> {
    let cache_id = parse_cache_id(&cache_id)?;
    let entry = state.cache.fetch_by_id(&cache_id, &caller).await?;
    Ok(Json(entry.into()))
}

/// `DELETE /cache/:cache_id`
#[instrument(skip_all, fields(caller = %caller, cache_id = %cache_id))]
pub async fn delete_entry(
    State(state): State<AppState>,
    CallerAuth(caller): CallerAuth,
    Path(cache_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let cache_id = parse_cache_id(&cache_id)?;
    state.cache.delete(&cache_id, &caller).await?;

    info!(cache_id = %cache_id, "Cache entry deleted");
    Ok(Json(json!({
        "message": "Cache entry deleted",
        "cache_id": cache_id,
    })))
}

/// Query of `GET /cache/lookup`
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    /// Path to resolve
    pub api_path: Option<String>,
}

/// `GET /cache/lookup?api_path=...`: the entry a caller would be served.
///
/// Works without a token, in which case only predefined entries match.
pub async fn lookup_entry(
    State(state): State<AppState>,
    OptionalCaller(caller): OptionalCaller,
    Query(query): Query<LookupQuery>,
) -> Result<Json<CacheView>, ApiError> {
    let api_path = query
        .api_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("api_path query parameter is required"))?;

    let entry = state
        .cache
        .fetch_latest_by_path_or_predefined(caller.as_ref(), &api_path)
        .await?;
    Ok(Json(entry.into()))
}

fn parse_cache_id(raw: &str) -> Result<CacheId, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found())
}
