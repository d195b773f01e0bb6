//! Process-wide metrics collection.
//!
//! [`MetricsCollector`] is the single entry point for recording operational
//! data. It writes through the `metrics` facade, so every update lands in
//! whichever recorder is installed: the Prometheus recorder from
//! [`install`] in the daemon, a `DebuggingRecorder` in tests, or nothing at
//! all (every call is then a no-op).
//!
//! Recording is a best-effort side channel. None of these functions return
//! errors, and none of them can abort the request that calls them.
//!
//! # Lifecycle
//!
//! ```text
//! process start ──► install() ──► MetricsCollector::record_* (any task)
//!                                   │
//!                     GET /metrics ─┴─► MetricsCollector::export()
//! ```

mod context;
mod export;
mod system;

pub use context::{ContextState, HttpStatus, RequestMetricsContext};
pub use export::{METRICS_CONTENT_TYPE, MetricsExporter, build_recorder, exporter, install};
pub use system::{HostSampler, HostSnapshot, SysinfoSampler, SystemInfo, refresh_system_metrics};

use crate::telemetry;

/// Records requests, uploads, searches, cache activity, rate-limit
/// rejections, errors and gauges.
///
/// All methods are associated functions: state lives in the installed
/// recorder, which is shared by every task in the process.
pub struct MetricsCollector;

impl MetricsCollector {
    /// Count one finished HTTP request and record its latency.
    ///
    /// `path` must be a route template (e.g. `/api/stores/{name}`), not a raw
    /// URI, to keep label cardinality bounded.
    pub fn record_request(method: &str, path: &str, status_code: u16, duration_seconds: f64) {
        metrics::counter!(telemetry::HTTP_REQUESTS_TOTAL,
            "method" => method.to_owned(),
            "path" => path.to_owned(),
            "status" => status_class(status_code),
        )
        .increment(1);
        metrics::histogram!(telemetry::HTTP_REQUEST_DURATION_SECONDS,
            "method" => method.to_owned(),
            "path" => path.to_owned(),
        )
        .record(duration_seconds);
    }

    /// Record one file upload attempt.
    pub fn record_file_upload(store: &str, size_bytes: u64, duration_seconds: f64, success: bool) {
        let outcome = outcome(success);
        metrics::counter!(telemetry::FILE_UPLOADS_TOTAL, "store" => store.to_owned()).increment(1);
        metrics::counter!(telemetry::FILE_UPLOAD_RESULTS_TOTAL,
            "store" => store.to_owned(),
            "outcome" => outcome,
        )
        .increment(1);
        metrics::histogram!(telemetry::FILE_UPLOAD_SIZE_BYTES,
            "store" => store.to_owned(),
            "outcome" => outcome,
        )
        .record(size_bytes as f64);
        metrics::histogram!(telemetry::FILE_UPLOAD_DURATION_SECONDS,
            "store" => store.to_owned(),
            "outcome" => outcome,
        )
        .record(duration_seconds);
    }

    /// Record one search.
    pub fn record_search(store: &str, duration_seconds: f64, result_count: usize, success: bool) {
        let outcome = outcome(success);
        metrics::counter!(telemetry::SEARCHES_TOTAL,
            "store" => store.to_owned(),
            "outcome" => outcome,
        )
        .increment(1);
        metrics::histogram!(telemetry::SEARCH_DURATION_SECONDS,
            "store" => store.to_owned(),
            "outcome" => outcome,
        )
        .record(duration_seconds);
        metrics::histogram!(telemetry::SEARCH_RESULTS_COUNT, "store" => store.to_owned())
            .record(result_count as f64);
    }

    pub fn record_cache_hit(cache_name: &str) {
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => cache_name.to_owned())
            .increment(1);
    }

    pub fn record_cache_miss(cache_name: &str) {
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => cache_name.to_owned())
            .increment(1);
    }

    pub fn update_cache_size(cache_name: &str, size: u64) {
        metrics::gauge!(telemetry::CACHE_SIZE, "cache" => cache_name.to_owned()).set(size as f64);
    }

    pub fn record_rate_limit_exceeded(path: &str) {
        metrics::counter!(telemetry::RATE_LIMIT_EXCEEDED_TOTAL, "path" => path.to_owned())
            .increment(1);
    }

    /// Count an error returned to a client. `error_kind` is an
    /// [`ErrorKind`](crate::ErrorKind) code.
    pub fn record_error(error_kind: &str, path: &str) {
        metrics::counter!(telemetry::ERRORS_TOTAL,
            "kind" => error_kind.to_owned(),
            "path" => path.to_owned(),
        )
        .increment(1);
    }

    pub fn update_stores_count(count: usize) {
        metrics::gauge!(telemetry::ACTIVE_STORES).set(count as f64);
    }

    /// Sample CPU, memory and disk from the host and update the system gauges.
    ///
    /// Never fails: on a sampling error a warning is logged and the previous
    /// gauge values are kept.
    pub fn update_system_metrics() -> Option<HostSnapshot> {
        Self::update_system_metrics_with(SysinfoSampler::global())
    }

    /// [`update_system_metrics`](Self::update_system_metrics) with an explicit sampler.
    pub fn update_system_metrics_with(sampler: &dyn HostSampler) -> Option<HostSnapshot> {
        system::update_gauges(sampler)
    }

    /// Render every metric in the Prometheus text format.
    ///
    /// Returns an empty body when no exporter has been installed.
    pub fn export() -> (Vec<u8>, &'static str) {
        match exporter() {
            Some(exporter) => exporter.export(),
            None => (Vec::new(), METRICS_CONTENT_TYPE),
        }
    }
}

fn status_class(status_code: u16) -> &'static str {
    match status_code {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "failure" }
}
