//! File size limits.

use super::Validated;
use crate::{FileSearchError, Result};

/// Bytes in one megabyte (MiB) as used by all size limits.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Metadata about a validated file size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeInfo {
    /// Size in MB rounded to 2 decimals, for reporting.
    pub size_mb: f64,
}

/// Validate a declared upload size against a per-deployment limit.
///
/// Sizes `<= 0` (empty or corrupt uploads) and sizes above
/// `max_mb * 1024 * 1024` fail with `FileTooLarge`. A non-finite or
/// non-positive `max_mb` rejects everything.
pub fn validate_file_size(size_bytes: i64, max_mb: f64) -> Result<Validated<u64, SizeInfo>> {
    let limit = max_mb * BYTES_PER_MB;
    let within_limit = (size_bytes as f64) <= limit;
    if size_bytes <= 0 || !within_limit {
        return Err(FileSearchError::FileTooLarge {
            size_bytes,
            max_mb,
        });
    }

    let size = size_bytes.unsigned_abs();
    Ok(Validated::new(
        size,
        SizeInfo {
            size_mb: size_in_mb(size),
        },
    ))
}

/// Convert bytes to MB rounded to 2 decimals.
pub fn size_in_mb(size_bytes: u64) -> f64 {
    (size_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}
