//! Scoped per-request timing.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use super::MetricsCollector;
use crate::FileSearchError;

const SUCCESS_STATUS: u16 = 200;
const FAILURE_STATUS: u16 = 500;

/// Errors that know which HTTP status they represent.
///
/// [`RequestMetricsContext::fail`] uses this to label a failed request;
/// errors without a status are recorded as 500.
pub trait HttpStatus {
    fn http_status(&self) -> Option<u16>;
}

impl HttpStatus for FileSearchError {
    fn http_status(&self) -> Option<u16> {
        Some(self.status_code())
    }
}

impl HttpStatus for std::io::Error {
    fn http_status(&self) -> Option<u16> {
        None
    }
}

impl HttpStatus for Box<dyn std::error::Error + Send + Sync> {
    fn http_status(&self) -> Option<u16> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Active,
    Completed,
    Failed,
}

/// Times one request and records it exactly once.
///
/// Created on entry, it ends in one of three ways:
///
/// - [`complete`](Self::complete) / [`complete_with`](Self::complete_with) record a
///   success (200 by default);
/// - [`fail`](Self::fail) / [`fail_with`](Self::fail_with) record a failure with the
///   error's status (500 when the error has none);
/// - dropping it while still active (early `?`, panic, cancelled future)
///   records a failure with status 500.
///
/// ```no_run
/// use filesearch::metrics::RequestMetricsContext;
///
/// let ctx = RequestMetricsContext::enter("POST", "/api/search");
/// // ... handle the request ...
/// ctx.complete();
/// ```
#[must_use = "dropping the context immediately records a failed request"]
pub struct RequestMetricsContext {
    method: String,
    path: String,
    start: Instant,
    state: ContextState,
}

impl RequestMetricsContext {
    /// Start timing a request.
    pub fn enter(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            start: Instant::now(),
            state: ContextState::Active,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn complete(self) {
        self.complete_with(SUCCESS_STATUS);
    }

    pub fn complete_with(mut self, status_code: u16) {
        self.finish(ContextState::Completed, status_code);
    }

    pub fn fail<E: HttpStatus + ?Sized>(mut self, error: &E) {
        let status_code = error.http_status().unwrap_or(FAILURE_STATUS);
        self.finish(ContextState::Failed, status_code);
    }

    pub fn fail_with(mut self, status_code: u16) {
        self.finish(ContextState::Failed, status_code);
    }

    /// Run `fut` inside a context. `Ok` completes with 200, `Err` fails
    /// with the error's status. The result is passed through untouched.
    pub async fn scope<T, E, F>(
        method: impl Into<String>,
        path: impl Into<String>,
        fut: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: HttpStatus,
    {
        let ctx = Self::enter(method, path);
        let result = fut.await;
        match &result {
            Ok(_) => ctx.complete(),
            Err(e) => ctx.fail(e),
        }
        result
    }

    /// Synchronous counterpart of [`scope`](Self::scope).
    pub fn scope_sync<T, E, F>(method: impl Into<String>, path: impl Into<String>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: HttpStatus,
    {
        let ctx = Self::enter(method, path);
        let result = f();
        match &result {
            Ok(_) => ctx.complete(),
            Err(e) => ctx.fail(e),
        }
        result
    }

    fn finish(&mut self, state: ContextState, status_code: u16) {
        if self.state != ContextState::Active {
            return;
        }
        self.state = state;
        MetricsCollector::record_request(
            &self.method,
            &self.path,
            status_code,
            self.start.elapsed().as_secs_f64(),
        );
    }
}

impl Drop for RequestMetricsContext {
    fn drop(&mut self) {
        if self.state == ContextState::Active {
            debug!(
                method = %self.method,
                path = %self.path,
                "request ended without a terminal status, recording as failed"
            );
            self.finish(ContextState::Failed, FAILURE_STATUS);
        }
    }
}
