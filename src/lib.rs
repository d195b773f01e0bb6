//! filesearch - validated, instrumented facade over a managed document-search API
//!
//! The crate wraps a hosted file-search backend (Gemini File Search by
//! default) behind a small service that validates every input, names every
//! failure, and records Prometheus metrics for every request.
//!
//! # Library Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use filesearch::{FileSearchService, GeminiClient, IncomingFile, SearchParams};
//!
//! #[tokio::main]
//! async fn main() -> filesearch::Result<()> {
//!     let provider = Arc::new(GeminiClient::new("your-api-key")?);
//!     let service = FileSearchService::builder(provider).build();
//!
//!     service
//!         .upload_file("manuals", IncomingFile::new("guide.txt", "Reset by holding the button."))
//!         .await?;
//!
//!     let result = service
//!         .search("manuals", "How do I reset it?", &SearchParams::default())
//!         .await?;
//!     println!("{}", result.answer.answer);
//!     Ok(())
//! }
//! ```
//!
//! # Metrics
//!
//! Call [`metrics::install`] once at startup; [`MetricsCollector::export`]
//! then renders the Prometheus text format.

pub mod cache;
pub mod error;
pub mod metrics;
pub mod providers;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
pub mod telemetry;
pub mod types;
pub mod validation;
mod version;

// Re-export main types at crate root
pub use error::{ErrorKind, FileSearchError, Result};
pub use service::{DEFAULT_STORE, FileSearchService, FileSearchServiceBuilder, UploadPolicy};
pub use version::{GIT_BRANCH, GIT_SHA, PKG_VERSION, git_dirty, version_string};

pub use cache::{CacheConfig, SearchCache};
pub use metrics::{MetricsCollector, RequestMetricsContext};
pub use providers::{GeminiClient, MemoryProvider, RetryConfig, SearchProvider};

pub use types::{
    BatchUploadReport, FileReport, FileStatus, IncomingFile, SearchAnswer, SearchParams,
    SearchResult, Source, StagedFile, StoreInfo, UploadAck, UploadReceipt,
};

pub use validation::{
    ContentTypePolicy, Validated, validate_content_type, validate_file_size, validate_filename,
    validate_query, validate_store_name, validate_upload_file,
};
