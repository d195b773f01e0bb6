//! Retry configuration, delay calculation, and the provider decorator.
//!
//! [`RetryingSearchProvider`] wraps any [`SearchProvider`] and retries
//! transient failures through the shared `with_retry()` helper.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use super::traits::SearchProvider;
use crate::telemetry;
use crate::types::{SearchAnswer, SearchParams, StagedFile, UploadAck};
use crate::Result;

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with optional jitter:
///
/// ```rust
/// # use filesearch::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(true);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    #[serde(rename = "initial_delay_ms", deserialize_with = "millis")]
    pub initial_delay: Duration,
    /// Maximum delay between retries. Default: 30s.
    #[serde(rename = "max_delay_ms", deserialize_with = "millis")]
    pub max_delay: Duration,
    /// Whether to add up to 25% random jitter to backoff delays. Default: true.
    pub jitter: bool,
}

fn millis<'de, D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Backoff for a 0-indexed attempt: `initial_delay * 2^attempt`, capped
    /// at `max_delay`. Jitter is not included.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Delay actually slept before the next attempt.
    ///
    /// A provider `retry_after` hint wins over backoff. Otherwise the
    /// backoff gets jitter (if enabled). Both are capped at `max_delay`.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_delay);
        }
        let base = self.delay_for_attempt(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=0.25);
        base.mul_f64(1.0 + extra).min(self.max_delay)
    }
}

// ============================================================================
// Shared retry helper
// ============================================================================

/// Execute an async operation with retry logic.
///
/// Retries errors for which [`crate::FileSearchError::is_transient()`]
/// holds, up to `config.max_attempts`. Permanent errors are returned
/// immediately.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e),
        };

        attempt += 1;
        if attempt >= attempts {
            return Err(err);
        }

        metrics::counter!(telemetry::PROVIDER_RETRIES_TOTAL,
            "provider" => provider_name.to_owned(),
            "operation" => operation.to_owned(),
        )
        .increment(1);
        let delay = config.effective_delay(attempt - 1, err.retry_after());
        warn!(
            provider = provider_name,
            operation,
            attempt,
            max_attempts = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient error"
        );
        tokio::time::sleep(delay).await;
    }
}

// ============================================================================
// RetryingSearchProvider
// ============================================================================

/// Decorator that wraps a [`SearchProvider`] with retry logic.
///
/// Store creation and deletion, uploads and searches are all retried.
/// Uploads re-read the staged file on each attempt.
pub struct RetryingSearchProvider {
    inner: Arc<dyn SearchProvider>,
    config: RetryConfig,
}

impl RetryingSearchProvider {
    pub fn new(inner: Arc<dyn SearchProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl SearchProvider for RetryingSearchProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn create_store(&self, display_name: &str) -> Result<String> {
        with_retry(&self.config, self.inner.name(), "create_store", || {
            self.inner.create_store(display_name)
        })
        .await
    }

    async fn upload(&self, store_id: &str, file: &StagedFile) -> Result<UploadAck> {
        with_retry(&self.config, self.inner.name(), "upload", || {
            self.inner.upload(store_id, file)
        })
        .await
    }

    async fn search(
        &self,
        store_id: &str,
        query: &str,
        params: &SearchParams,
    ) -> Result<SearchAnswer> {
        with_retry(&self.config, self.inner.name(), "search", || {
            self.inner.search(store_id, query, params)
        })
        .await
    }

    async fn delete_store(&self, store_id: &str) -> Result<()> {
        with_retry(&self.config, self.inner.name(), "delete_store", || {
            self.inner.delete_store(store_id)
        })
        .await
    }
}
