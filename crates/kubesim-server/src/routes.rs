//! Route definitions for the simulator API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get, post, MethodRouter},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{handlers, middleware, state::AppState};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.body_limit;

    Router::new()
        .route("/", get(handlers::welcome).fallback(handlers::method_not_allowed))
        .route("/details", any(handlers::details))
        // Simulated Kubernetes API
        .route("/api", simulated_core())
        .route("/api/*path", simulated_core())
        .route("/apis", simulated_groups())
        .route("/apis/*path", simulated_groups())
        // Cache management
        .merge(cache_routes())
        // Operational endpoints
        .route("/healthz", get(handlers::health_check).fallback(handlers::method_not_allowed))
        .route("/readyz", get(handlers::readiness_check).fallback(handlers::method_not_allowed))
        .route("/metrics", get(handlers::metrics_endpoint).fallback(handlers::method_not_allowed))
        .fallback(handlers::not_found)
        // Apply middleware
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::observe_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(middleware::cors_layer())
        .with_state(state)
}

/// `/api` accepts every verb the simulator answers
fn simulated_core() -> MethodRouter<AppState> {
    get(handlers::simulate)
        .post(handlers::simulate)
        .put(handlers::simulate)
        .patch(handlers::simulate)
        .delete(handlers::simulate)
        .fallback(handlers::method_not_allowed)
}

/// `/apis` is read-only
fn simulated_groups() -> MethodRouter<AppState> {
    get(handlers::simulate).fallback(handlers::method_not_allowed)
}

fn cache_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/cache",
            get(handlers::list_entries)
                .post(handlers::create_entry)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/cache/lookup",
            get(handlers::lookup_entry).fallback(handlers::method_not_allowed),
        )
        .route(
            "/cache/:cache_id",
            get(handlers::get_entry)
                .delete(handlers::delete_entry)
                .fallback(handlers::method_not_allowed),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::builder().build().unwrap())
    }

    async fn send(method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, body) = send(Method::GET, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let (status, body) = send(Method::POST, "/apis/apps/v1/deployments").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method not allowed");

        let (status, _) = send(Method::PUT, "/cache").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_lookup_is_not_shadowed_by_id_route() {
        let (status, body) = send(Method::GET, "/cache/lookup").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"], "api_path query parameter is required");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.headers().contains_key(middleware::RESPONSE_TIME_HEADER));
    }
}
