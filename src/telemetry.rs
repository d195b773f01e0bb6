//! Telemetry metric name constants.
//!
//! Centralised metric names for filesearch operations. The daemon installs a
//! Prometheus recorder at startup (see [`crate::metrics::install`]); library
//! consumers may install their own `metrics` recorder instead. Without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `filesearch_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`, `_bytes`).
//!
//! # Common labels
//!
//! - `method`, `path`: HTTP method and matched route template (never the raw URI)
//! - `status`: HTTP status class: "2xx", "4xx", "5xx"
//! - `store`: store name
//! - `outcome`: "success" or "failure"
//! - `cache`: cache name (e.g. "search")
//! - `kind`: error code (e.g. "INVALID_FILENAME")
//!
//! Filenames and queries are never used as labels.

/// Total HTTP requests that reached a terminal state.
///
/// Labels: `method`, `path`, `status`.
pub const HTTP_REQUESTS_TOTAL: &str = "filesearch_http_requests_total";

/// HTTP request latency in seconds.
///
/// Labels: `method`, `path`.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "filesearch_http_request_duration_seconds";

/// Total file upload attempts.
///
/// Labels: `store`.
pub const FILE_UPLOADS_TOTAL: &str = "filesearch_file_uploads_total";

/// File upload attempts by outcome.
///
/// Labels: `store`, `outcome`.
pub const FILE_UPLOAD_RESULTS_TOTAL: &str = "filesearch_file_upload_results_total";

/// Uploaded file size in bytes.
///
/// Labels: `store`, `outcome`.
pub const FILE_UPLOAD_SIZE_BYTES: &str = "filesearch_file_upload_size_bytes";

/// Upload duration (staging + provider call) in seconds.
///
/// Labels: `store`, `outcome`.
pub const FILE_UPLOAD_DURATION_SECONDS: &str = "filesearch_file_upload_duration_seconds";

/// Total searches.
///
/// Labels: `store`, `outcome`.
pub const SEARCHES_TOTAL: &str = "filesearch_searches_total";

/// Search latency in seconds.
///
/// Labels: `store`, `outcome`.
pub const SEARCH_DURATION_SECONDS: &str = "filesearch_search_duration_seconds";

/// Number of sources returned per search.
///
/// Labels: `store`.
pub const SEARCH_RESULTS_COUNT: &str = "filesearch_search_results_count";

/// Total cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "filesearch_cache_hits_total";

/// Total cache misses.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "filesearch_cache_misses_total";

/// Current number of cached entries.
///
/// Labels: `cache`.
pub const CACHE_SIZE: &str = "filesearch_cache_size";

/// Requests rejected by the rate limiter.
///
/// Labels: `path`.
pub const RATE_LIMIT_EXCEEDED_TOTAL: &str = "filesearch_rate_limit_exceeded_total";

/// Errors returned to clients.
///
/// Labels: `kind`, `path`.
pub const ERRORS_TOTAL: &str = "filesearch_errors_total";

/// Total provider retry attempts (not counting the initial call).
///
/// Labels: `provider`, `operation`.
pub const PROVIDER_RETRIES_TOTAL: &str = "filesearch_provider_retries_total";

/// Number of active stores.
pub const ACTIVE_STORES: &str = "filesearch_active_stores";

/// Host CPU utilisation, percent.
pub const SYSTEM_CPU_PERCENT: &str = "filesearch_system_cpu_usage_percent";

/// Host memory utilisation, percent.
pub const SYSTEM_MEMORY_PERCENT: &str = "filesearch_system_memory_usage_percent";

/// Host memory available, bytes.
pub const SYSTEM_MEMORY_AVAILABLE_BYTES: &str = "filesearch_system_memory_available_bytes";

/// Utilisation of the disk holding the upload staging directory, percent.
pub const SYSTEM_DISK_PERCENT: &str = "filesearch_system_disk_usage_percent";

/// Free space on the disk holding the upload staging directory, bytes.
pub const SYSTEM_DISK_FREE_BYTES: &str = "filesearch_system_disk_free_bytes";
