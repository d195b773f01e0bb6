//! Store name checks.

use super::Validated;
use crate::{FileSearchError, Result};

/// Maximum store name length in characters.
pub const MAX_STORE_NAME_CHARS: usize = 100;

/// Validate a store name.
///
/// Store names appear in URLs and as the `store` metric label, so they are
/// kept short and free of separators and control characters.
pub fn validate_store_name(name: &str) -> Result<Validated<String>> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FileSearchError::InvalidRequest(
            "store name cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_STORE_NAME_CHARS {
        return Err(FileSearchError::InvalidRequest(format!(
            "store name exceeds {MAX_STORE_NAME_CHARS} characters"
        )));
    }
    if trimmed.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
        return Err(FileSearchError::InvalidRequest(
            "store name contains invalid characters".to_string(),
        ));
    }
    Ok(Validated::new(trimmed.to_string(), ()))
}
