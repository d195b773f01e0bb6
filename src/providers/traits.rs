//! The narrow interface to a managed document-search backend.
//!
//! The facade never embeds, indexes or generates on its own. Everything
//! past validation is delegated through [`SearchProvider`], which keeps the
//! backend swappable: [`GeminiClient`](super::GeminiClient) in production,
//! [`MemoryProvider`](super::MemoryProvider) offline and in tests, and
//! decorators such as [`RetryingSearchProvider`](super::RetryingSearchProvider)
//! layered on top.

use async_trait::async_trait;

use crate::Result;
use crate::types::{SearchAnswer, SearchParams, StagedFile, UploadAck};

/// Backend that stores documents and answers grounded queries.
///
/// Store ids are provider resource names (e.g. `fileSearchStores/abc123`),
/// not the user-facing store names.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging and metric labels.
    fn name(&self) -> &str;

    /// Model used when [`SearchParams::model`] is unset.
    fn default_model(&self) -> &str;

    /// Create a store and return its resource id.
    async fn create_store(&self, display_name: &str) -> Result<String>;

    /// Upload and index one staged file. Returns once indexing is done.
    async fn upload(&self, store_id: &str, file: &StagedFile) -> Result<UploadAck>;

    /// Answer `query` from the documents in a store.
    async fn search(&self, store_id: &str, query: &str, params: &SearchParams)
    -> Result<SearchAnswer>;

    /// Delete a store and every document in it.
    async fn delete_store(&self, store_id: &str) -> Result<()>;
}
