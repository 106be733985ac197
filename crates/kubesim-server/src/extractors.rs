//! Custom Axum extractors.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
};
use bytes::Bytes;
use kubesim_core::{CallerToken, SimError, SimResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::SocketAddr;
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Authenticated caller, from `Authorization: Bearer <uuid>`
#[derive(Debug, Clone, Copy)]
pub struct CallerAuth(pub CallerToken);

#[async_trait]
impl<S> FromRequestParts<S> for CallerAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;

        Ok(Self(CallerToken::from_authorization(auth_str)?))
    }
}

/// Caller if a valid bearer token is present
#[derive(Debug, Clone, Copy)]
pub struct OptionalCaller(pub Option<CallerToken>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| CallerToken::from_authorization(v).ok());
        Ok(Self(token))
    }
}

/// Client address used for per-IP admission control.
///
/// The socket peer address, unless the server trusts forwarding headers.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_forwarded_for {
            if let Some(ip) = forwarded_ip(&parts.headers) {
                return Ok(Self(ip));
            }
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());

        Ok(Self(ip))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}

/// Whether the request declares a JSON body
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .is_some_and(|m| m.essence_str() == mime::APPLICATION_JSON.essence_str())
}

/// Validate and parse a JSON request body
pub fn parse_json_body(headers: &HeaderMap, body: &[u8]) -> SimResult<Value> {
    if !is_json_content_type(headers) {
        return Err(SimError::validation("Content-Type must be application/json"));
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "JSON parse error");
        SimError::validation("Invalid JSON body")
    })
}

/// JSON body extractor reporting failures as `{"error": "Invalid request", ...}`
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {e}")))?;

        let value = parse_json_body(&headers, &bytes)?;
        let parsed = serde_json::from_value(value).map_err(|e| {
            debug!(error = %e, "JSON shape error");
            ApiError::bad_request(format!("Invalid JSON body: {e}"))
        })?;

        Ok(Self(parsed))
    }
}
