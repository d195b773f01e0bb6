use std::time::Duration;

use filesearch::{ErrorKind, FileSearchError};

#[test]
fn kinds_map_to_codes_and_statuses() {
    let cases = [
        (ErrorKind::InvalidFilename, "INVALID_FILENAME", 400),
        (ErrorKind::FileTooLarge, "FILE_SIZE_EXCEEDED", 400),
        (ErrorKind::EmptyQuery, "EMPTY_SEARCH_QUERY", 400),
        (ErrorKind::QueryTooLong, "QUERY_TOO_LONG", 400),
        (ErrorKind::UnsupportedContentType, "UNSUPPORTED_CONTENT_TYPE", 400),
        (ErrorKind::InvalidRequest, "INVALID_REQUEST", 400),
        (ErrorKind::NotFound, "NOT_FOUND", 404),
        (ErrorKind::RateLimited, "RATE_LIMITED", 429),
        (ErrorKind::ServiceUnavailable, "SERVICE_UNAVAILABLE", 503),
        (ErrorKind::Internal, "INTERNAL_ERROR", 500),
    ];
    for (kind, code, status) in cases {
        assert_eq!(kind.code(), code);
        assert_eq!(kind.status_code(), status, "{code}");
    }
}

#[test]
fn kind_serializes_as_code() {
    let json = serde_json::to_string(&ErrorKind::FileTooLarge).unwrap();
    assert_eq!(json, "\"FILE_SIZE_EXCEEDED\"");
    let json = serde_json::to_string(&ErrorKind::ServiceUnavailable).unwrap();
    assert_eq!(json, "\"SERVICE_UNAVAILABLE\"");
}

#[test]
fn only_transient_kinds_are_retryable() {
    assert!(ErrorKind::RateLimited.is_retryable());
    assert!(ErrorKind::ServiceUnavailable.is_retryable());
    assert!(!ErrorKind::InvalidFilename.is_retryable());
    assert!(!ErrorKind::Internal.is_retryable());
}

#[test]
fn api_errors_classify_by_upstream_status() {
    let api = |status| FileSearchError::Api {
        status,
        message: "upstream".into(),
    };
    assert_eq!(api(404).kind(), ErrorKind::NotFound);
    assert_eq!(api(429).kind(), ErrorKind::RateLimited);
    assert_eq!(api(500).kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(api(503).kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(api(400).kind(), ErrorKind::Internal);
    assert_eq!(api(403).kind(), ErrorKind::Internal);
}

#[test]
fn transport_failures_are_unavailable_and_transient() {
    let http = FileSearchError::Http("connection reset".into());
    assert_eq!(http.kind(), ErrorKind::ServiceUnavailable);
    assert!(http.is_transient());

    assert!(FileSearchError::EmptyResponse.is_transient());
    assert!(
        FileSearchError::Api {
            status: 502,
            message: String::new()
        }
        .is_transient()
    );
    assert!(
        !FileSearchError::Api {
            status: 401,
            message: String::new()
        }
        .is_transient()
    );
    assert!(!FileSearchError::EmptyQuery.is_transient());
}

#[test]
fn retry_after_only_from_rate_limits() {
    let limited = FileSearchError::RateLimited {
        retry_after: Some(Duration::from_secs(7)),
    };
    assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
    assert_eq!(limited.status_code(), 429);
    assert_eq!(FileSearchError::EmptyQuery.retry_after(), None);
}

#[test]
fn internal_details_are_hidden_from_clients() {
    let err = FileSearchError::Configuration("key sk-secret in /etc/filesearch".into());
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.client_message(), "An internal error occurred");

    let io = FileSearchError::from(std::io::Error::other("/tmp/filesearch-abc/secret.pdf"));
    assert!(!io.client_message().contains("/tmp"));

    let upstream = FileSearchError::Api {
        status: 500,
        message: "stack trace".into(),
    };
    assert!(!upstream.client_message().contains("stack trace"));
}

#[test]
fn validation_messages_reach_clients() {
    let err = FileSearchError::QueryTooLong { length: 1001, max: 1000 };
    assert_eq!(
        err.client_message(),
        "search query too long: 1001 characters (max 1000)"
    );

    let unavailable = FileSearchError::ServiceUnavailable {
        service: "Gemini".into(),
        reason: "upload did not finish".into(),
    };
    assert_eq!(unavailable.client_message(), "Gemini unavailable: upload did not finish");
}

#[test]
fn file_size_messages() {
    let over = FileSearchError::FileTooLarge {
        size_bytes: 52_428_801,
        max_mb: 50.0,
    };
    assert_eq!(over.to_string(), "file size 52428801 bytes exceeds the 50 MB limit");

    let empty = FileSearchError::FileTooLarge {
        size_bytes: 0,
        max_mb: 50.0,
    };
    assert!(empty.to_string().contains("empty"));
}

#[test]
fn store_not_found_names_the_store() {
    let err = FileSearchError::store_not_found("manuals");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "store 'manuals' not found");
}
