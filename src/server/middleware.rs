//! Request middleware.
//!
//! Outermost to innermost: request id → security headers → metrics →
//! timeout → rate limit (route layer) → handler.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{Instrument, warn};

use super::error::ApiError;
use super::rate_limit::RouteClass;
use super::state::AppState;
use crate::ErrorKind;
use crate::metrics::{MetricsCollector, RequestMetricsContext};

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

/// Path label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Id of the request being handled on this task, if any.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

/// Route template for metric labels, never the raw URI.
fn route_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Reuse a sane client-supplied id, otherwise mint a UUID v4.
pub async fn request_id(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| {
            !v.is_empty()
                && v.len() <= MAX_REQUEST_ID_LEN
                && v.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let header_value = HeaderValue::from_str(&request_id).ok();
    let mut response = REQUEST_ID
        .scope(request_id, next.run(req))
        .instrument(span)
        .await;
    if let Some(value) = header_value {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    response
}

/// Time every request through a [`RequestMetricsContext`] and count
/// error responses by kind.
///
/// If the client disconnects, this future is dropped with the context
/// still active, which records the request as a failure.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let path = route_label(&req);
    let ctx = RequestMetricsContext::enter(req.method().as_str(), path.clone());

    let response = next.run(req).await;
    let status = response.status().as_u16();
    if let Some(kind) = response.extensions().get::<ErrorKind>() {
        MetricsCollector::record_error(kind.code(), &path);
    }

    if response.status().is_server_error() {
        ctx.fail_with(status);
    } else {
        ctx.complete_with(status);
    }
    response
}

/// Answer 503 when the handler runs past the configured timeout.
pub async fn timeout(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let limit = state.request_timeout;
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(timeout_secs = limit.as_secs(), "request timed out");
            ApiError::new(ErrorKind::ServiceUnavailable, "Request timed out").into_response()
        }
    }
}

/// Per-client, per-route-class token buckets.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = route_label(&req);
    let Some(class) = RouteClass::classify(req.method(), &path) else {
        return next.run(req).await;
    };

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = state.limiter.client_key(req.headers(), peer);

    match state.limiter.check(class, &client) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            MetricsCollector::record_rate_limit_exceeded(&path);
            warn!(route = %path, class = class.as_str(), client = %client, "rate limit exceeded");
            ApiError::rate_limited(retry_after).into_response()
        }
    }
}
