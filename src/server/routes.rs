//! Route table and middleware stack.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use tower::limit::GlobalConcurrencyLimitLayer;

use super::error::ApiError;
use super::handlers;
use super::middleware;
use super::state::AppState;
use crate::ErrorKind;

/// Body limit of every route that does not accept uploads.
const API_BODY_LIMIT: usize = 1024 * 1024;

/// Build the application router.
///
/// `Router::layer` wraps each route, so the metrics and rate limit
/// middleware see the matched route template. Upload routes carry their own
/// body limit, which overrides the router-wide one.
pub fn router(state: AppState) -> Router {
    let single_limit = state.config.uploads.single_body_limit_bytes();
    let batch_limit = state.config.uploads.body_limit_bytes();
    let max_concurrent = state.config.server.limits.max_concurrent_requests.max(1);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_prometheus))
        .route("/api/metrics", get(handlers::metrics_summary))
        .route(
            "/api/upload/single",
            post(handlers::upload_single).layer(DefaultBodyLimit::max(single_limit)),
        )
        .route(
            "/api/upload/multiple",
            post(handlers::upload_multiple).layer(DefaultBodyLimit::max(batch_limit)),
        )
        .route("/api/search", post(handlers::search).get(handlers::search_get))
        .route("/api/stores", get(handlers::list_stores).post(handlers::create_store))
        .route("/api/stores/{name}", delete(handlers::delete_store))
        .fallback(not_found)
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(from_fn_with_state(state.clone(), middleware::timeout))
        .layer(from_fn(middleware::track_metrics))
        .layer(from_fn(middleware::security_headers))
        .layer(from_fn(middleware::request_id))
        .layer(DefaultBodyLimit::max(API_BODY_LIMIT))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::new(ErrorKind::NotFound, "Resource not found")
}
