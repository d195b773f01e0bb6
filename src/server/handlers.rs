//! HTTP request handlers.
//!
//! Handlers stay thin: extract, call [`FileSearchService`](crate::FileSearchService),
//! attach the request id. All validation happens in the service; all error
//! shaping happens in [`ApiError`].

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ApiError, timestamp};
use super::middleware::current_request_id;
use super::rate_limit::RouteClass;
use super::state::AppState;
use crate::FileSearchError;
use crate::metrics::{MetricsCollector, SystemInfo, refresh_system_metrics};
use crate::service::DEFAULT_STORE;
use crate::types::{
    BatchUploadReport, IncomingFile, RejectedFile, SearchParams, SearchResult, StoreInfo,
    UploadReceipt,
};
use crate::validation::BYTES_PER_MB;
use crate::version;

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request and response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_store")]
    pub store_name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Query string of `GET /api/search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_store")]
    pub store: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    #[serde(default = "default_store")]
    pub name: String,
}

fn default_store() -> String {
    DEFAULT_STORE.to_string()
}

#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    status: &'static str,
    #[serde(flatten)]
    body: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

fn success<T: Serialize>(body: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        body,
        request_id: current_request_id(),
    })
}

#[derive(Serialize)]
struct StoreList {
    count: usize,
    stores: Vec<StoreInfo>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum SystemStatus {
    Available(SystemInfo),
    Unavailable { error: &'static str },
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: String,
    provider: String,
    uptime_seconds: f64,
    uptime_formatted: String,
    stores: usize,
    timestamp: String,
    system: SystemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

#[derive(Serialize)]
pub struct MetricsSummary {
    stores_count: usize,
    stores: Vec<String>,
    config: ConfigSummary,
    system: SystemStatus,
    uptime_seconds: f64,
}

#[derive(Serialize)]
struct ConfigSummary {
    provider: String,
    default_model: String,
    max_file_size_mb: f64,
    max_files_per_request: usize,
    cache_enabled: bool,
    rate_limiting_enabled: bool,
}

// ============================================================================
// Info and health
// ============================================================================

/// `GET /`: service description, endpoints and limits.
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let limits = state.limiter.config();
    let per_minute = |class: RouteClass| format!("{} requests per minute", limits.per_minute(class));
    Json(serde_json::json!({
        "name": "filesearch",
        "version": version::PKG_VERSION,
        "description": "Validated, instrumented facade over a managed document-search API",
        "health": "/health",
        "endpoints": {
            "upload_single": "POST /api/upload/single",
            "upload_multiple": "POST /api/upload/multiple",
            "search": "POST /api/search or GET /api/search?q=...",
            "stores": "GET|POST /api/stores, DELETE /api/stores/{name}",
            "metrics": "GET /metrics (Prometheus), GET /api/metrics (JSON)",
        },
        "rate_limits": {
            "upload_single": per_minute(RouteClass::UploadSingle),
            "upload_multiple": per_minute(RouteClass::UploadMultiple),
            "search": per_minute(RouteClass::Search),
            "store_write": per_minute(RouteClass::StoreWrite),
            "general": per_minute(RouteClass::General),
        },
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.uptime();
    Json(HealthResponse {
        status: "healthy",
        version: version::version_string(),
        provider: state.service.provider_name().to_string(),
        uptime_seconds: round2(uptime.as_secs_f64()),
        uptime_formatted: format_uptime(uptime),
        stores: state.service.store_count(),
        timestamp: timestamp(),
        system: sample_system(&state).await,
        request_id: current_request_id(),
    })
}

async fn sample_system(state: &AppState) -> SystemStatus {
    let timeout = state.config.metrics.sample_timeout();
    match refresh_system_metrics(state.sampler.clone(), timeout).await {
        Some(snapshot) => SystemStatus::Available(snapshot.into()),
        None => SystemStatus::Unavailable {
            error: "unavailable",
        },
    }
}

/// Uptime as `1d 2h 3m 4s`, dropping leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {secs}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ============================================================================
// Uploads
// ============================================================================

struct UploadForm {
    store: String,
    files: Vec<Result<IncomingFile, RejectedFile>>,
}

/// Collect the `store` field and every `file`/`files` part.
///
/// Parts are read chunk by chunk. Once a part passes `max_file_mb` its
/// buffer is dropped and the rest of it is only counted, so an oversized
/// part never sits in memory.
async fn read_upload_form(
    mut multipart: Multipart,
    max_files: usize,
    max_file_mb: f64,
) -> Result<UploadForm, ApiError> {
    let max_file_bytes = (max_file_mb.max(0.0) * BYTES_PER_MB) as u64;
    let mut store = None;
    let mut files = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "store" => store = Some(field.text().await?),
            "file" | "files" => {
                if files.len() >= max_files {
                    return Err(ApiError::invalid_request(format!(
                        "at most {max_files} files are accepted per request"
                    )));
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);

                let mut data = Vec::new();
                let mut received: u64 = 0;
                while let Some(chunk) = field.chunk().await? {
                    received += chunk.len() as u64;
                    if received <= max_file_bytes {
                        data.extend_from_slice(&chunk);
                    } else if !data.is_empty() {
                        data = Vec::new();
                    }
                }

                if received > max_file_bytes {
                    debug!(filename = %filename, received, "multipart part over the size limit");
                    files.push(Err(RejectedFile {
                        error: FileSearchError::FileTooLarge {
                            size_bytes: i64::try_from(received).unwrap_or(i64::MAX),
                            max_mb: max_file_mb,
                        },
                        filename,
                    }));
                } else {
                    files.push(Ok(IncomingFile {
                        filename,
                        content_type,
                        data,
                    }));
                }
            }
            other => debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let store = store
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default_store);
    Ok(UploadForm { store, files })
}

fn max_file_mb(state: &AppState) -> f64 {
    state.service.upload_policy().max_file_size_mb
}

/// `POST /api/upload/single`: multipart with one `file` and optional `store`.
pub async fn upload_single(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Envelope<UploadReceipt>> {
    let form = read_upload_form(multipart, 1, max_file_mb(&state)).await?;
    let file = match form.files.into_iter().next() {
        Some(Ok(file)) => file,
        Some(Err(rejected)) => return Err(rejected.error.into()),
        None => return Err(ApiError::invalid_request("multipart field 'file' is required")),
    };
    let receipt = state.service.upload_file(&form.store, file).await?;
    Ok(success(receipt))
}

/// `POST /api/upload/multiple`: multipart with repeated `files` parts.
pub async fn upload_multiple(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BatchUploadReport>, ApiError> {
    let max_files = state.config.uploads.max_files_per_request.max(1);
    let form = read_upload_form(multipart, max_files, max_file_mb(&state)).await?;
    if form.files.is_empty() {
        return Err(ApiError::invalid_request("at least one file is required in field 'files'"));
    }
    let report = state.service.upload_batch(&form.store, form.files).await?;
    Ok(Json(report))
}

// ============================================================================
// Search
// ============================================================================

/// `POST /api/search`
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Envelope<SearchResult>> {
    let Json(request) = payload?;
    let params = SearchParams {
        model: request.model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    };
    let result = state
        .service
        .search(&request.store_name, &request.query, &params)
        .await?;
    Ok(success(result))
}

/// `GET /api/search?q=...&store=...&model=...`
pub async fn search_get(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Envelope<SearchResult>> {
    let Query(query) = query?;
    let params = SearchParams {
        model: query.model,
        max_tokens: query.max_tokens,
        temperature: query.temperature,
    };
    let result = state.service.search(&query.store, &query.q, &params).await?;
    Ok(success(result))
}

// ============================================================================
// Stores
// ============================================================================

/// `POST /api/stores`
pub async fn create_store(
    State(state): State<AppState>,
    payload: Result<Json<StoreRequest>, JsonRejection>,
) -> ApiResult<Envelope<StoreInfo>> {
    let Json(request) = payload?;
    let store = state.service.create_store(&request.name).await?;
    Ok(success(store))
}

/// `GET /api/stores`
pub async fn list_stores(State(state): State<AppState>) -> impl IntoResponse {
    let stores = state.service.list_stores();
    success(StoreList {
        count: stores.len(),
        stores,
    })
}

/// `DELETE /api/stores/{name}`
pub async fn delete_store(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
) -> ApiResult<Envelope<StoreInfo>> {
    let Path(name) = name?;
    let store = state.service.delete_store(&name).await?;
    Ok(success(store))
}

// ============================================================================
// Metrics
// ============================================================================

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics_prometheus() -> impl IntoResponse {
    let (body, content_type) = MetricsCollector::export();
    ([(header::CONTENT_TYPE, content_type)], body)
}

/// `GET /api/metrics`: JSON summary for humans.
pub async fn metrics_summary(State(state): State<AppState>) -> Json<MetricsSummary> {
    let stores: Vec<String> = state
        .service
        .list_stores()
        .into_iter()
        .map(|s| s.name)
        .collect();
    let uploads = &state.config.uploads;

    Json(MetricsSummary {
        stores_count: stores.len(),
        stores,
        config: ConfigSummary {
            provider: state.service.provider_name().to_string(),
            default_model: state.service.default_model().to_string(),
            max_file_size_mb: uploads.max_file_size_mb,
            max_files_per_request: uploads.max_files_per_request,
            cache_enabled: state.service.cache_enabled(),
            rate_limiting_enabled: state.limiter.config().enabled,
        },
        system: sample_system(&state).await,
        uptime_seconds: round2(state.uptime().as_secs_f64()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uptime_drops_leading_zero_units() {
        assert_eq!(format_uptime(Duration::from_secs(4)), "4s");
        assert_eq!(format_uptime(Duration::from_secs(184)), "3m 4s");
        assert_eq!(format_uptime(Duration::from_secs(7_384)), "2h 3m 4s");
        assert_eq!(format_uptime(Duration::from_secs(93_784)), "1d 2h 3m 4s");
        assert_eq!(format_uptime(Duration::from_secs(86_400)), "1d 0h 0m 0s");
    }
}
