use std::sync::Arc;
use std::time::{Duration, Instant};

use super::config::Config;
use super::rate_limit::RateLimiter;
use crate::FileSearchService;
use crate::metrics::{HostSampler, SysinfoSampler};

/// Shared application state passed to every handler via axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FileSearchService>,
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
    pub sampler: Arc<dyn HostSampler>,
    pub started_at: Instant,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: Arc<FileSearchService>, config: Config) -> Self {
        Self {
            service,
            limiter: Arc::new(RateLimiter::new(config.rate_limits.clone())),
            request_timeout: config.request_timeout(),
            config: Arc::new(config),
            sampler: Arc::new(SysinfoSampler::new()),
            started_at: Instant::now(),
        }
    }

    /// Replace the host sampler (tests use a fixed or failing one).
    pub fn with_sampler(mut self, sampler: Arc<dyn HostSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
