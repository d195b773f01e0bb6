//! HTTP error responses.
//!
//! Every failure leaves the server as the same JSON shape:
//!
//! ```json
//! {
//!   "error": "INVALID_FILENAME",
//!   "message": "invalid filename '../x': path traversal is not allowed",
//!   "status_code": 400,
//!   "request_id": "6f1c…",
//!   "timestamp": "2025-01-01T00:00:00Z"
//! }
//! ```
//!
//! The [`ErrorKind`] is also attached to the response extensions so the
//! metrics middleware can count errors by kind without parsing bodies.

use std::time::Duration;

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

use super::middleware::current_request_id;
use crate::{ErrorKind, FileSearchError};

/// Error returned by handlers and middleware.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    retry_after: Option<Duration>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    timestamp: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn rate_limited(retry_after: Duration) -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            message: "Rate limit exceeded, retry later".to_string(),
            retry_after: Some(retry_after),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<FileSearchError> for ApiError {
    fn from(err: FileSearchError) -> Self {
        match err.kind() {
            ErrorKind::Internal => error!(error = %err, "request failed with internal error"),
            ErrorKind::ServiceUnavailable => warn!(error = %err, "provider unavailable"),
            _ => {}
        }
        Self {
            kind: err.kind(),
            message: err.client_message(),
            retry_after: err.retry_after(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(ErrorKind::FileTooLarge, "request body exceeds the upload limit");
        }
        Self::invalid_request(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.kind.code(),
            message: self.message,
            status_code: status.as_u16(),
            request_id: current_request_id(),
            timestamp: timestamp(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response.extensions_mut().insert(self.kind);
        response
    }
}

/// Current UTC time as RFC 3339.
pub(crate) fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.unix_timestamp().to_string())
}
