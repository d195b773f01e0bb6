//! Prometheus recorder installation and text export.

use std::sync::OnceLock;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use parking_lot::Mutex;
use tracing::info;

use crate::telemetry;
use crate::{FileSearchError, Result};

/// Media type of the Prometheus text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Latency buckets (seconds). Provider calls dominate, so the tail is long.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Upload size buckets (bytes), 1 KiB .. 100 MiB.
const SIZE_BUCKETS: &[f64] = &[
    1_024.0,
    10_240.0,
    102_400.0,
    1_048_576.0,
    5_242_880.0,
    10_485_760.0,
    52_428_800.0,
    104_857_600.0,
];

/// Sources-per-search buckets.
const RESULT_COUNT_BUCKETS: &[f64] = &[0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0];

static EXPORTER: OnceLock<MetricsExporter> = OnceLock::new();
static INSTALL_LOCK: Mutex<()> = Mutex::new(());

/// Handle for rendering the installed recorder's state.
#[derive(Clone)]
pub struct MetricsExporter {
    handle: PrometheusHandle,
}

impl MetricsExporter {
    /// Render all metrics as Prometheus text.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Render all metrics as `(body, content_type)`.
    pub fn export(&self) -> (Vec<u8>, &'static str) {
        (self.render().into_bytes(), METRICS_CONTENT_TYPE)
    }

    /// Drain histogram buffers. The daemon calls this periodically.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

/// Install the process-wide Prometheus recorder.
///
/// Idempotent: the first call installs, later calls return the same
/// exporter. Fails only if some other recorder was installed first.
pub fn install() -> Result<&'static MetricsExporter> {
    if let Some(exporter) = EXPORTER.get() {
        return Ok(exporter);
    }

    let _guard = INSTALL_LOCK.lock();
    if let Some(exporter) = EXPORTER.get() {
        return Ok(exporter);
    }

    let handle = builder()?.install_recorder().map_err(|e| {
        FileSearchError::Configuration(format!("failed to install metrics recorder: {e}"))
    })?;
    info!("prometheus metrics recorder installed");
    Ok(EXPORTER.get_or_init(|| MetricsExporter { handle }))
}

/// The installed exporter, if [`install`] has run.
pub fn exporter() -> Option<&'static MetricsExporter> {
    EXPORTER.get()
}

/// Build a standalone recorder without installing it globally.
///
/// Useful with `metrics::with_local_recorder` to render an isolated view.
pub fn build_recorder() -> Result<(PrometheusRecorder, MetricsExporter)> {
    let recorder = builder()?.build_recorder();
    let exporter = MetricsExporter {
        handle: recorder.handle(),
    };
    Ok((recorder, exporter))
}

fn builder() -> Result<PrometheusBuilder> {
    let bucket_error =
        |e| FileSearchError::Configuration(format!("invalid histogram buckets: {e}"));
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), LATENCY_BUCKETS)
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Full(telemetry::FILE_UPLOAD_SIZE_BYTES.to_string()),
                SIZE_BUCKETS,
            )
        })
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Full(telemetry::SEARCH_RESULTS_COUNT.to_string()),
                RESULT_COUNT_BUCKETS,
            )
        })
        .map_err(bucket_error)
}
