//! Search query and generation parameter checks.

use super::Validated;
use crate::{FileSearchError, Result};

/// Maximum query length in characters (after trimming).
pub const MAX_QUERY_CHARS: usize = 1000;

/// Upper bound for `max_tokens`.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Upper bound for `temperature`.
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Metadata about a validated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryInfo {
    /// Length of the trimmed query in characters.
    pub length: usize,
}

/// Validate a search query.
///
/// Empty or whitespace-only queries fail with `EmptyQuery`; queries longer
/// than [`MAX_QUERY_CHARS`] after trimming fail with `QueryTooLong`. The
/// returned value is the trimmed query, otherwise unchanged.
pub fn validate_query(query: &str) -> Result<Validated<String, QueryInfo>> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(FileSearchError::EmptyQuery);
    }

    let length = trimmed.chars().count();
    if length > MAX_QUERY_CHARS {
        return Err(FileSearchError::QueryTooLong {
            length,
            max: MAX_QUERY_CHARS,
        });
    }

    Ok(Validated::new(trimmed.to_string(), QueryInfo { length }))
}

/// Validate optional generation parameters forwarded to the provider.
pub fn validate_search_params(max_tokens: Option<u32>, temperature: Option<f32>) -> Result<()> {
    if let Some(tokens) = max_tokens {
        if tokens == 0 || tokens > MAX_OUTPUT_TOKENS {
            return Err(FileSearchError::InvalidRequest(format!(
                "max_tokens must be between 1 and {MAX_OUTPUT_TOKENS}, got {tokens}"
            )));
        }
    }
    if let Some(temperature) = temperature {
        if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(FileSearchError::InvalidRequest(format!(
                "temperature must be between 0.0 and {MAX_TEMPERATURE}, got {temperature}"
            )));
        }
    }
    Ok(())
}
