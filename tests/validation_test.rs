//! Validator behaviour at the public API surface.

use filesearch::validation::{
    BYTES_PER_MB, ContentTypePolicy, MAX_QUERY_CHARS, validate_content_type, validate_file_size,
    validate_filename, validate_query, validate_search_params, validate_store_name,
    validate_upload_file,
};
use filesearch::{ErrorKind, FileSearchError};

// ============================================================================
// Filenames
// ============================================================================

#[test]
fn accepts_plain_filenames() {
    for name in ["report.pdf", "notes.txt", "Q3 summary (final).docx", "archive.tar.gz", ".env"] {
        let validated = validate_filename(name).unwrap();
        assert_eq!(validated.value(), name);
    }
}

#[test]
fn trims_surrounding_whitespace() {
    let validated = validate_filename("  report.pdf \n").unwrap();
    assert_eq!(validated.value(), "report.pdf");
    assert_eq!(validated.metadata().extension.as_deref(), Some("pdf"));
}

#[test]
fn extension_is_lowercased() {
    let validated = validate_filename("Scan.PDF").unwrap();
    assert_eq!(validated.metadata().extension.as_deref(), Some("pdf"));
    assert!(validate_filename("Makefile").unwrap().metadata().extension.is_none());
}

#[test]
fn rejects_traversal_and_absolute_paths() {
    let rejected = [
        "../../etc/passwd",
        "..",
        "..\\windows\\system32",
        "/etc/passwd",
        "\\\\server\\share\\file.txt",
        "C:\\Windows\\win.ini",
        "c:report.pdf",
        "dir/file.txt",
        "dir\\file.txt",
    ];
    for name in rejected {
        let err = validate_filename(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilename, "{name:?} should be rejected");
    }
}

#[test]
fn traversal_error_names_the_reason() {
    let err = validate_filename("../../etc/passwd").unwrap_err();
    assert!(err.to_string().contains("path traversal"), "got: {err}");
}

#[test]
fn rejects_empty_control_and_reserved() {
    for name in ["", "   ", "a\0b.txt", "line\nbreak.txt", "what?.txt", "a<b>.txt", "pipe|.txt", "..."] {
        let err = validate_filename(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilename, "{name:?} should be rejected");
    }
}

#[test]
fn rejects_overlong_names() {
    let exact = format!("{}.txt", "a".repeat(251));
    assert!(validate_filename(&exact).is_ok());

    let long = format!("{}.txt", "a".repeat(252));
    assert_eq!(validate_filename(&long).unwrap_err().kind(), ErrorKind::InvalidFilename);
}

// ============================================================================
// Sizes
// ============================================================================

#[test]
fn size_at_limit_is_accepted() {
    let limit = (50.0 * BYTES_PER_MB) as i64;
    let validated = validate_file_size(limit, 50.0).unwrap();
    assert_eq!(*validated.value(), limit as u64);
    assert_eq!(validated.metadata().size_mb, 50.0);
}

#[test]
fn size_one_byte_over_is_rejected() {
    let err = validate_file_size(52_428_801, 50.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileTooLarge);
    assert_eq!(err.status_code(), 400);
    assert!(err.to_string().contains("52428801"));
}

#[test]
fn zero_and_negative_sizes_are_rejected() {
    for size in [0, -1, i64::MIN] {
        let err = validate_file_size(size, 50.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileTooLarge);
    }
}

#[test]
fn size_mb_is_rounded_to_two_decimals() {
    assert_eq!(validate_file_size(1_048_576, 50.0).unwrap().metadata().size_mb, 1.0);
    assert_eq!(validate_file_size(1_500_000, 50.0).unwrap().metadata().size_mb, 1.43);
}

#[test]
fn invalid_limit_rejects_everything() {
    assert!(validate_file_size(1, 0.0).is_err());
    assert!(validate_file_size(1, -5.0).is_err());
    assert!(validate_file_size(1, f64::NAN).is_err());
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn query_is_trimmed() {
    let validated = validate_query("  what is the refund policy?  ").unwrap();
    assert_eq!(validated.value(), "what is the refund policy?");
    assert_eq!(validated.metadata().length, 26);
}

#[test]
fn blank_queries_are_empty() {
    for q in ["", " ", "\t\n  "] {
        assert!(matches!(validate_query(q), Err(FileSearchError::EmptyQuery)));
    }
}

#[test]
fn query_length_is_counted_in_chars() {
    let at_limit = "é".repeat(MAX_QUERY_CHARS);
    assert!(validate_query(&at_limit).is_ok());

    let over = "x".repeat(MAX_QUERY_CHARS + 1);
    let err = validate_query(&over).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryTooLong);
    assert_eq!(err.status_code(), 400);
}

#[test]
fn padding_does_not_count_toward_length() {
    let padded = format!("   {}   ", "x".repeat(MAX_QUERY_CHARS));
    assert!(validate_query(&padded).is_ok());
}

#[test]
fn search_params_ranges() {
    assert!(validate_search_params(None, None).is_ok());
    assert!(validate_search_params(Some(1), Some(0.0)).is_ok());
    assert!(validate_search_params(Some(8192), Some(2.0)).is_ok());

    for (tokens, temperature) in [(Some(0), None), (Some(8193), None), (None, Some(-0.1)), (None, Some(2.5))] {
        let err = validate_search_params(tokens, temperature).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
    assert!(validate_search_params(None, Some(f32::NAN)).is_err());
}

// ============================================================================
// Stores and content types
// ============================================================================

#[test]
fn store_names() {
    assert_eq!(validate_store_name("  manuals ").unwrap().into_value(), "manuals");
    for name in ["", "  ", "a/b", "a\\b", "tab\there"] {
        assert_eq!(validate_store_name(name).unwrap_err().kind(), ErrorKind::InvalidRequest);
    }
    assert!(validate_store_name(&"s".repeat(100)).is_ok());
    assert!(validate_store_name(&"s".repeat(101)).is_err());
}

#[test]
fn content_type_defaults_when_missing_or_malformed() {
    let policy = ContentTypePolicy::default();
    for declared in [None, Some(""), Some("not a type"), Some("text/")] {
        let validated = validate_content_type(declared, &policy).unwrap();
        assert_eq!(validated.value(), "application/octet-stream");
        assert!(validated.metadata().defaulted);
    }
}

#[test]
fn content_type_parameters_are_stripped() {
    let validated = validate_content_type(Some("Text/Plain; charset=UTF-8"), &ContentTypePolicy::default()).unwrap();
    assert_eq!(validated.value(), "text/plain");
    assert!(!validated.metadata().defaulted);
}

#[test]
fn default_policy_denies_executables() {
    let err = validate_content_type(Some("application/x-msdownload"), &ContentTypePolicy::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedContentType);
    assert!(validate_content_type(Some("image/png"), &ContentTypePolicy::default()).is_ok());
}

#[test]
fn allow_list_supports_wildcards() {
    let policy = ContentTypePolicy::AllowList(vec!["text/*".into(), "application/pdf".into()]);
    assert!(validate_content_type(Some("text/markdown"), &policy).is_ok());
    assert!(validate_content_type(Some("application/pdf"), &policy).is_ok());
    assert!(validate_content_type(Some("image/png"), &policy).is_err());
    assert!(validate_content_type(None, &policy).is_ok());
}

// ============================================================================
// Combined upload validation
// ============================================================================

#[test]
fn upload_reports_size_and_type() {
    let validated = validate_upload_file(
        "report.pdf",
        1_048_576,
        Some("application/pdf"),
        50.0,
        &ContentTypePolicy::default(),
    )
    .unwrap();
    let (name, info) = validated.into_parts();
    assert_eq!(name, "report.pdf");
    assert_eq!(info.size_bytes, 1_048_576);
    assert_eq!(info.size_mb, 1.0);
    assert_eq!(info.content_type, "application/pdf");
    assert_eq!(info.extension.as_deref(), Some("pdf"));
}

#[test]
fn upload_checks_name_before_size() {
    let err = validate_upload_file("../x", 0, None, 50.0, &ContentTypePolicy::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFilename);

    let err = validate_upload_file("x.bin", 0, Some("application/x-msdownload"), 50.0, &ContentTypePolicy::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileTooLarge);
}
