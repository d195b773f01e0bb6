//! Request validators.
//!
//! Pure functions that enforce input constraints before any provider call
//! is made. Each validator returns a [`Validated`] value on success and a
//! [`FileSearchError`](crate::FileSearchError) with a validation kind on
//! failure. Validators never retry or recover; the caller decides how to
//! shape the response.
//!
//! Callers must continue with the *normalized* value carried by
//! [`Validated`], never with the raw input.

pub mod content_type;
pub mod filename;
pub mod query;
pub mod size;
pub mod store;

pub use content_type::{ContentTypeInfo, ContentTypePolicy, DEFAULT_CONTENT_TYPE, validate_content_type};
pub use filename::{FilenameInfo, MAX_FILENAME_BYTES, validate_filename};
pub use query::{MAX_QUERY_CHARS, QueryInfo, validate_query, validate_search_params};
pub use size::{BYTES_PER_MB, SizeInfo, size_in_mb, validate_file_size};
pub use store::{MAX_STORE_NAME_CHARS, validate_store_name};

use crate::Result;

/// A successfully validated value plus what the validator learned about it.
///
/// Only constructed on success, so holding one proves the checks passed.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T, M = ()> {
    value: T,
    metadata: M,
}

impl<T, M> Validated<T, M> {
    pub(crate) fn new(value: T, metadata: M) -> Self {
        Self { value, metadata }
    }

    /// The normalized value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Metadata collected during validation.
    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// Split into `(value, metadata)`.
    pub fn into_parts(self) -> (T, M) {
        (self.value, self.metadata)
    }

    /// Take the normalized value, dropping the metadata.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Everything learned while validating an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadInfo {
    pub size_bytes: u64,
    /// Size in MB, rounded to 2 decimals.
    pub size_mb: f64,
    /// Effective content type (defaulted when the client sent none).
    pub content_type: String,
    /// Lowercased file extension, if any.
    pub extension: Option<String>,
}

/// Validate one uploaded file: name, size and declared content type.
///
/// Checks run in that order and the first failure wins. The returned value
/// is the sanitized filename to use for staging.
pub fn validate_upload_file(
    filename: &str,
    size_bytes: i64,
    content_type: Option<&str>,
    max_mb: f64,
    policy: &ContentTypePolicy,
) -> Result<Validated<String, UploadInfo>> {
    let (name, name_info) = validate_filename(filename)?.into_parts();
    let (size, size_info) = validate_file_size(size_bytes, max_mb)?.into_parts();
    let (content_type, _) = validate_content_type(content_type, policy)?.into_parts();

    Ok(Validated::new(
        name,
        UploadInfo {
            size_bytes: size,
            size_mb: size_info.size_mb,
            content_type,
            extension: name_info.extension,
        },
    ))
}

/// Validate a raw search query. Alias of [`validate_query`] kept for
/// symmetry with [`validate_upload_file`].
pub fn validate_search_request(query: &str) -> Result<Validated<String, QueryInfo>> {
    validate_query(query)
}
