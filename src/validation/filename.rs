//! Filename safety checks.

use std::ffi::OsStr;
use std::path::Path;

use super::Validated;
use crate::{FileSearchError, Result};

/// Maximum filename length in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Characters rejected on every platform (reserved on Windows filesystems).
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Longest prefix of a rejected filename echoed back in error messages.
const MAX_ECHOED_CHARS: usize = 64;

/// Metadata about a validated filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameInfo {
    /// Lowercased extension without the dot.
    pub extension: Option<String>,
}

/// Validate an uploaded filename.
///
/// Rejects empty names, absolute paths, parent-directory references, path
/// separators, control characters, reserved characters, dot-only names and
/// names longer than [`MAX_FILENAME_BYTES`]. On success the value is a bare
/// base name with surrounding whitespace removed, safe to join onto a
/// staging directory.
pub fn validate_filename(filename: &str) -> Result<Validated<String, FilenameInfo>> {
    let reject = |reason: &str| FileSearchError::InvalidFilename {
        filename: echo(filename),
        reason: reason.to_string(),
    };

    let name = filename.trim();
    if name.is_empty() {
        return Err(reject("filename is empty"));
    }
    if name.chars().any(char::is_control) {
        return Err(reject("filename contains control characters"));
    }
    if is_absolute(name) {
        return Err(reject("absolute paths are not allowed"));
    }
    if name.split(['/', '\\']).any(|component| component == "..") {
        return Err(reject("path traversal is not allowed"));
    }
    if name.contains(['/', '\\']) {
        return Err(reject("path separators are not allowed"));
    }
    if name.contains(RESERVED_CHARS) {
        return Err(reject("filename contains reserved characters"));
    }
    if name.len() > MAX_FILENAME_BYTES {
        return Err(reject("filename exceeds 255 bytes"));
    }
    if name.chars().all(|c| c == '.') {
        return Err(reject("filename must contain a name"));
    }

    let extension = Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);

    Ok(Validated::new(name.to_string(), FilenameInfo { extension }))
}

/// Unix root, UNC/backslash root, or a Windows drive prefix (`C:`).
fn is_absolute(name: &str) -> bool {
    if name.starts_with('/') || name.starts_with('\\') {
        return true;
    }
    let mut chars = name.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(drive), Some(':')) if drive.is_ascii_alphabetic()
    )
}

fn echo(filename: &str) -> String {
    let prefix: String = filename.chars().take(MAX_ECHOED_CHARS).collect();
    prefix.escape_debug().to_string()
}
