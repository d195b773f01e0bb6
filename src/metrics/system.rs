//! Host resource sampling.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Disks, System};
use tracing::warn;

use crate::telemetry;
use crate::{FileSearchError, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One reading of host CPU, memory and disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_available_bytes: u64,
    pub disk_percent: f64,
    pub disk_free_bytes: u64,
}

/// Rounded, human-facing view of a [`HostSnapshot`] for the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_available_mb: f64,
    pub disk_percent: f64,
    pub disk_free_gb: f64,
}

impl From<HostSnapshot> for SystemInfo {
    fn from(s: HostSnapshot) -> Self {
        Self {
            cpu_percent: round1(s.cpu_percent),
            memory_percent: round1(s.memory_percent),
            memory_available_mb: round1(s.memory_available_bytes as f64 / BYTES_PER_MB),
            disk_percent: round1(s.disk_percent),
            disk_free_gb: round1(s.disk_free_bytes as f64 / BYTES_PER_GB),
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Source of host readings.
///
/// Implemented by [`SysinfoSampler`]; tests substitute failing or fixed
/// samplers.
pub trait HostSampler: Send + Sync {
    fn sample(&self) -> Result<HostSnapshot>;
}

/// Samples the local host with `sysinfo`.
///
/// CPU usage is a delta between refreshes, so the sampler keeps its
/// `System` between calls. The first reading after construction may be 0.
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }

    /// Process-wide sampler used by
    /// [`MetricsCollector::update_system_metrics`](super::MetricsCollector::update_system_metrics).
    pub fn global() -> &'static SysinfoSampler {
        static SAMPLER: OnceLock<SysinfoSampler> = OnceLock::new();
        SAMPLER.get_or_init(SysinfoSampler::new)
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler for SysinfoSampler {
    fn sample(&self) -> Result<HostSnapshot> {
        let (cpu_percent, total_memory, available_memory) = {
            let mut system = self.system.lock();
            system.refresh_cpu_usage();
            system.refresh_memory();
            (
                f64::from(system.global_cpu_usage()),
                system.total_memory(),
                system.available_memory(),
            )
        };
        if total_memory == 0 {
            return Err(FileSearchError::Internal(
                "memory statistics unavailable".to_string(),
            ));
        }

        // Uploads are staged under the temp dir, so report the disk holding it.
        let staging = std::env::temp_dir();
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|d| staging.starts_with(d.mount_point()) || d.mount_point() == Path::new("/"))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| FileSearchError::Internal("no disk found for staging directory".to_string()))?;

        let disk_total = disk.total_space();
        let disk_free = disk.available_space();
        let disk_percent = if disk_total == 0 {
            0.0
        } else {
            (disk_total.saturating_sub(disk_free)) as f64 / disk_total as f64 * 100.0
        };

        Ok(HostSnapshot {
            cpu_percent,
            memory_percent: (total_memory.saturating_sub(available_memory)) as f64
                / total_memory as f64
                * 100.0,
            memory_available_bytes: available_memory,
            disk_percent,
            disk_free_bytes: disk_free,
        })
    }
}

/// Sample and set the system gauges. On failure, log and keep the old values.
pub(super) fn update_gauges(sampler: &dyn HostSampler) -> Option<HostSnapshot> {
    let sampled = panic::catch_unwind(AssertUnwindSafe(|| sampler.sample()));
    let snapshot = match sampled {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to update system metrics");
            return None;
        }
        Err(_) => {
            warn!("Failed to update system metrics: sampler panicked");
            return None;
        }
    };

    metrics::gauge!(telemetry::SYSTEM_CPU_PERCENT).set(snapshot.cpu_percent);
    metrics::gauge!(telemetry::SYSTEM_MEMORY_PERCENT).set(snapshot.memory_percent);
    metrics::gauge!(telemetry::SYSTEM_MEMORY_AVAILABLE_BYTES)
        .set(snapshot.memory_available_bytes as f64);
    metrics::gauge!(telemetry::SYSTEM_DISK_PERCENT).set(snapshot.disk_percent);
    metrics::gauge!(telemetry::SYSTEM_DISK_FREE_BYTES).set(snapshot.disk_free_bytes as f64);
    Some(snapshot)
}

/// Samplers whose blocking sample is still running, keyed by address.
static IN_FLIGHT: Mutex<Vec<usize>> = Mutex::new(Vec::new());

/// Marks a sampler busy until dropped. Owned by the blocking task, so the
/// mark outlives a caller that stopped waiting.
struct InFlight(usize);

impl InFlight {
    fn acquire(sampler: &Arc<dyn HostSampler>) -> Option<Self> {
        let key = Arc::as_ptr(sampler) as *const () as usize;
        let mut in_flight = IN_FLIGHT.lock();
        if in_flight.contains(&key) {
            return None;
        }
        in_flight.push(key);
        Some(Self(key))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.lock().retain(|key| *key != self.0);
    }
}

/// Run a sampler on the blocking pool, bounded by `timeout`.
///
/// Gauges are left untouched when sampling fails or takes too long. A
/// sample that timed out keeps running in the background, and until it
/// returns further refreshes with the same sampler are skipped, so a hung
/// sampler holds at most one blocking thread.
pub async fn refresh_system_metrics(
    sampler: Arc<dyn HostSampler>,
    timeout: Duration,
) -> Option<HostSnapshot> {
    let Some(slot) = InFlight::acquire(&sampler) else {
        warn!("Failed to update system metrics: previous sample still running");
        return None;
    };
    let task = tokio::task::spawn_blocking(move || {
        let _slot = slot;
        update_gauges(sampler.as_ref())
    });
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to update system metrics");
            None
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Failed to update system metrics: sampling timed out");
            None
        }
    }
}
