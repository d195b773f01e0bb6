//! Upload inputs and outcomes

use std::path::PathBuf;

use serde::Serialize;

use crate::ErrorKind;

/// A file as received from a client, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A batch entry rejected before its bytes were fully received, e.g. a
/// multipart part that ran past the size limit.
#[derive(Debug)]
pub struct RejectedFile {
    /// The name as sent.
    pub filename: String,
    pub error: crate::FileSearchError,
}

/// A validated file written to the local staging directory.
///
/// Providers read the content from `path`; `filename` is the validated
/// name and is also the last component of `path`.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Provider acknowledgement for an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadAck {
    /// Provider resource name of the indexed document.
    pub document: String,
}

/// Result of a single-file upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub store: String,
    pub filename: String,
    pub size_mb: f64,
    pub content_type: String,
    pub document: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Failed,
}

/// Per-file entry in a [`BatchUploadReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    /// Validated name on success, the name as sent on failure.
    pub filename: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorKind>,
}

impl FileReport {
    pub fn uploaded(receipt: &UploadReceipt) -> Self {
        Self {
            filename: receipt.filename.clone(),
            status: FileStatus::Uploaded,
            size_mb: Some(receipt.size_mb),
            error: None,
            code: None,
        }
    }

    pub fn failed(filename: impl Into<String>, error: &crate::FileSearchError) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Failed,
            size_mb: None,
            error: Some(error.client_message()),
            code: Some(error.kind()),
        }
    }
}

/// Outcome of a multi-file upload. Individual failures do not abort the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchUploadReport {
    /// `"success"` when at least one file was uploaded, otherwise `"failed"`.
    pub status: &'static str,
    pub store: String,
    pub files: Vec<FileReport>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl BatchUploadReport {
    pub fn from_reports(store: impl Into<String>, files: Vec<FileReport>) -> Self {
        let successful = files
            .iter()
            .filter(|f| f.status == FileStatus::Uploaded)
            .count();
        let total = files.len();
        Self {
            status: if successful > 0 { "success" } else { "failed" },
            store: store.into(),
            files,
            total,
            successful,
            failed: total - successful,
        }
    }
}
