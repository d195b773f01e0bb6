//! Error taxonomy shared by validators, providers and the HTTP boundary.
//!
//! Every failure carries a stable [`ErrorKind`]. The kind decides the HTTP
//! status and the machine-readable code returned to clients, so callers
//! branch on [`FileSearchError::kind()`] rather than on variants.

use std::time::Duration;

use serde::{Serialize, Serializer};

/// Stable classification of a failure.
///
/// Kinds are what clients see (as `error` codes) and what the metrics
/// layer uses as the `kind` label. Add variants sparingly: each one is
/// a public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFilename,
    FileTooLarge,
    EmptyQuery,
    QueryTooLong,
    UnsupportedContentType,
    /// Malformed request body or out-of-range parameter.
    InvalidRequest,
    NotFound,
    RateLimited,
    ServiceUnavailable,
    /// Catch-all for anything uncategorized.
    Internal,
}

impl ErrorKind {
    /// Machine-readable code used in error response bodies and metric labels.
    pub const fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidFilename => "INVALID_FILENAME",
            ErrorKind::FileTooLarge => "FILE_SIZE_EXCEEDED",
            ErrorKind::EmptyQuery => "EMPTY_SEARCH_QUERY",
            ErrorKind::QueryTooLong => "QUERY_TOO_LONG",
            ErrorKind::UnsupportedContentType => "UNSUPPORTED_CONTENT_TYPE",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this kind.
    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidFilename
            | ErrorKind::FileTooLarge
            | ErrorKind::EmptyQuery
            | ErrorKind::QueryTooLong
            | ErrorKind::UnsupportedContentType
            | ErrorKind::InvalidRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::ServiceUnavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether a client may retry the same request later.
    pub const fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::ServiceUnavailable)
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Errors raised by the filesearch facade.
#[derive(Debug, thiserror::Error)]
pub enum FileSearchError {
    // Validation errors
    #[error("invalid filename '{filename}': {reason}")]
    InvalidFilename { filename: String, reason: String },

    #[error("{}", describe_size(*size_bytes, *max_mb))]
    FileTooLarge { size_bytes: i64, max_mb: f64 },

    #[error("search query cannot be empty")]
    EmptyQuery,

    #[error("search query too long: {length} characters (max {max})")]
    QueryTooLong { length: usize, max: usize },

    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Resource errors
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{service} unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("empty response from provider")]
    EmptyResponse,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn describe_size(size_bytes: i64, max_mb: f64) -> String {
    if size_bytes <= 0 {
        format!("file is empty or has an invalid size ({size_bytes} bytes)")
    } else {
        format!("file size {size_bytes} bytes exceeds the {max_mb} MB limit")
    }
}

impl FileSearchError {
    /// Stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FileSearchError::InvalidFilename { .. } => ErrorKind::InvalidFilename,
            FileSearchError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            FileSearchError::EmptyQuery => ErrorKind::EmptyQuery,
            FileSearchError::QueryTooLong { .. } => ErrorKind::QueryTooLong,
            FileSearchError::UnsupportedContentType { .. } => ErrorKind::UnsupportedContentType,
            FileSearchError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            FileSearchError::NotFound { .. } => ErrorKind::NotFound,
            FileSearchError::ServiceUnavailable { .. }
            | FileSearchError::Http(_)
            | FileSearchError::EmptyResponse => ErrorKind::ServiceUnavailable,
            FileSearchError::RateLimited { .. } => ErrorKind::RateLimited,
            FileSearchError::Api { status, .. } => match status {
                404 => ErrorKind::NotFound,
                429 => ErrorKind::RateLimited,
                500..=599 => ErrorKind::ServiceUnavailable,
                _ => ErrorKind::Internal,
            },
            FileSearchError::Json(_)
            | FileSearchError::Io(_)
            | FileSearchError::Configuration(_)
            | FileSearchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message safe to return to clients.
    ///
    /// Internal errors may embed paths, upstream bodies or key material in
    /// their `Display`; those are replaced by a generic message.
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "An internal error occurred".to_string(),
            ErrorKind::ServiceUnavailable => match self {
                FileSearchError::ServiceUnavailable { .. } => self.to_string(),
                _ => "The search provider is temporarily unavailable".to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Whether the provider call that produced this error may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FileSearchError::RateLimited { .. }
            | FileSearchError::Http(_)
            | FileSearchError::EmptyResponse => true,
            FileSearchError::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// Provider-suggested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FileSearchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Shorthand for a missing store.
    pub fn store_not_found(name: &str) -> Self {
        FileSearchError::NotFound {
            resource: format!("store '{name}'"),
        }
    }
}

impl From<reqwest::Error> for FileSearchError {
    fn from(err: reqwest::Error) -> Self {
        FileSearchError::Http(err.to_string())
    }
}

/// Result type alias for filesearch operations.
pub type Result<T> = std::result::Result<T, FileSearchError>;
