//! Declared content-type policy.
//!
//! This boundary is permissive on purpose: a missing or unparseable content
//! type falls back to [`DEFAULT_CONTENT_TYPE`] and is let through, and real
//! format verification is left to the search provider. Tightening it is a
//! policy change (see [`ContentTypePolicy::AllowList`]), not a bug fix.

use serde::{Deserialize, Serialize};

use super::Validated;
use crate::{FileSearchError, Result};

/// Content type assumed when the client declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Executable and script types refused under
/// [`ContentTypePolicy::DenyExecutables`].
const EXECUTABLE_TYPES: &[&str] = &[
    "application/x-msdownload",
    "application/x-msdos-program",
    "application/x-dosexec",
    "application/x-executable",
    "application/x-elf",
    "application/x-mach-binary",
    "application/vnd.microsoft.portable-executable",
    "application/x-sh",
    "application/x-csh",
    "application/x-bat",
    "application/x-powershell",
    "application/java-archive",
    "application/x-msi",
    "text/x-shellscript",
    "text/x-sh",
];

/// Document types accepted by the default allow-list.
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "application/pdf",
    "application/json",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/*",
];

/// How declared content types are checked.
///
/// ```toml
/// [uploads]
/// content_type_policy = "deny_executables"
/// # or
/// content_type_policy = { allow_list = ["application/pdf", "text/*"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypePolicy {
    /// Accept everything except known executable/script types.
    ///
    /// This is the default.
    #[default]
    DenyExecutables,

    /// Accept only the listed types. Entries may end in `/*` to accept a
    /// whole top-level type. The default binary type always passes.
    AllowList(Vec<String>),
}

impl ContentTypePolicy {
    /// Allow-list policy over [`DEFAULT_ALLOWED_TYPES`].
    pub fn default_allow_list() -> Self {
        ContentTypePolicy::AllowList(DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect())
    }

    fn permits(&self, essence: &str) -> bool {
        match self {
            ContentTypePolicy::DenyExecutables => !EXECUTABLE_TYPES.contains(&essence),
            ContentTypePolicy::AllowList(allowed) => {
                essence == DEFAULT_CONTENT_TYPE
                    || allowed.iter().any(|entry| matches_entry(entry, essence))
            }
        }
    }
}

/// Metadata about a validated content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTypeInfo {
    /// True when the declared value was missing or unparseable.
    pub defaulted: bool,
}

/// Check a declared content type against `policy`.
///
/// Parameters such as `; charset=utf-8` are ignored and comparison is
/// case-insensitive. The returned value is the bare, lowercased media type.
pub fn validate_content_type(
    declared: Option<&str>,
    policy: &ContentTypePolicy,
) -> Result<Validated<String, ContentTypeInfo>> {
    let Some(essence) = declared.and_then(essence) else {
        return Ok(Validated::new(
            DEFAULT_CONTENT_TYPE.to_string(),
            ContentTypeInfo { defaulted: true },
        ));
    };

    if !policy.permits(&essence) {
        return Err(FileSearchError::UnsupportedContentType {
            content_type: essence,
        });
    }

    Ok(Validated::new(essence, ContentTypeInfo { defaulted: false }))
}

/// `type/subtype` without parameters, or `None` when malformed.
fn essence(raw: &str) -> Option<String> {
    let media_type = raw.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = media_type.split_once('/')?;
    let well_formed = !kind.is_empty()
        && !subtype.is_empty()
        && !subtype.contains('/')
        && !media_type.contains(char::is_whitespace);
    well_formed.then_some(media_type)
}

fn matches_entry(entry: &str, essence: &str) -> bool {
    let entry = entry.trim();
    match entry.strip_suffix("/*") {
        Some(prefix) => essence
            .split_once('/')
            .is_some_and(|(kind, _)| kind.eq_ignore_ascii_case(prefix)),
        None => entry.eq_ignore_ascii_case(essence),
    }
}
