//! Store registry plus upload and search orchestration.
//!
//! [`FileSearchService`] is what the HTTP layer calls. Each operation runs
//! the same pipeline:
//!
//! ```text
//! raw input ──► validators ──► store lookup ──► (cache) ──► provider
//!                   │                                          │
//!                   └── Err(validation kind)        record_* metrics ──► result
//! ```
//!
//! The registry maps user-facing store names to provider resource ids. It
//! lives in memory only; a restart forgets every name, though the provider
//! keeps the stores themselves.

mod builder;

pub use builder::FileSearchServiceBuilder;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::cache::{SearchCache, SearchKey};
use crate::metrics::MetricsCollector;
use crate::providers::SearchProvider;
use crate::types::{
    BatchUploadReport, FileReport, IncomingFile, RejectedFile, SearchParams, SearchResult,
    StagedFile, StoreInfo, UploadReceipt,
};
use crate::validation::{
    ContentTypePolicy, validate_query, validate_search_params, validate_store_name,
    validate_upload_file,
};
use crate::{FileSearchError, Result};

/// Store name used when a request does not name one.
pub const DEFAULT_STORE: &str = "default";

#[derive(Debug, Clone)]
struct StoreEntry {
    resource: String,
    /// Bumped on every upload so cached answers for older contents miss.
    generation: u64,
}

/// Limits applied to every upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub max_file_size_mb: f64,
    pub content_type_policy: ContentTypePolicy,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50.0,
            content_type_policy: ContentTypePolicy::default(),
        }
    }
}

/// Validated, instrumented facade over a [`SearchProvider`].
pub struct FileSearchService {
    provider: Arc<dyn SearchProvider>,
    stores: RwLock<BTreeMap<String, StoreEntry>>,
    /// Serializes store creation so concurrent first uploads to the same
    /// name create one provider store.
    create_lock: tokio::sync::Mutex<()>,
    cache: Option<SearchCache>,
    uploads: UploadPolicy,
}

impl FileSearchService {
    pub fn builder(provider: Arc<dyn SearchProvider>) -> FileSearchServiceBuilder {
        FileSearchServiceBuilder::new(provider)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.uploads
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    // ========================================================================
    // Stores
    // ========================================================================

    /// Create a store, or return the existing one with that name.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn create_store(&self, name: &str) -> Result<StoreInfo> {
        let name = validate_store_name(name)?.into_value();
        let resource = self.ensure_store(&name).await?;
        Ok(StoreInfo { name, resource })
    }

    /// All known stores, ordered by name.
    pub fn list_stores(&self) -> Vec<StoreInfo> {
        self.stores
            .read()
            .iter()
            .map(|(name, entry)| StoreInfo {
                name: name.clone(),
                resource: entry.resource.clone(),
            })
            .collect()
    }

    pub fn store_count(&self) -> usize {
        self.stores.read().len()
    }

    /// Delete a store at the provider and forget it. `NotFound` if unknown.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn delete_store(&self, name: &str) -> Result<StoreInfo> {
        let name = validate_store_name(name)?.into_value();
        let _guard = self.create_lock.lock().await;
        let resource = self
            .lookup(&name)
            .map(|entry| entry.resource)
            .ok_or_else(|| FileSearchError::store_not_found(&name))?;

        self.provider.delete_store(&resource).await?;

        let count = {
            let mut stores = self.stores.write();
            stores.remove(&name);
            stores.len()
        };
        MetricsCollector::update_stores_count(count);
        info!(store = %name, resource = %resource, "store deleted");
        Ok(StoreInfo { name, resource })
    }

    fn lookup(&self, name: &str) -> Option<StoreEntry> {
        self.stores.read().get(name).cloned()
    }

    async fn ensure_store(&self, name: &str) -> Result<String> {
        if let Some(entry) = self.lookup(name) {
            return Ok(entry.resource);
        }

        let _guard = self.create_lock.lock().await;
        if let Some(entry) = self.lookup(name) {
            return Ok(entry.resource);
        }

        let resource = self.provider.create_store(name).await?;
        let count = {
            let mut stores = self.stores.write();
            stores.insert(
                name.to_string(),
                StoreEntry {
                    resource: resource.clone(),
                    generation: 0,
                },
            );
            stores.len()
        };
        MetricsCollector::update_stores_count(count);
        info!(store = %name, resource = %resource, "store created");
        Ok(resource)
    }

    fn bump_generation(&self, name: &str) {
        if let Some(entry) = self.stores.write().get_mut(name) {
            entry.generation += 1;
        }
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Validate and upload one file. The store is created on first use.
    #[instrument(skip(self, file), fields(size_bytes = file.data.len()))]
    pub async fn upload_file(&self, store: &str, file: IncomingFile) -> Result<UploadReceipt> {
        let store = validate_store_name(store)?.into_value();
        self.upload_validated_store(&store, file).await
    }

    /// Upload several files to one store.
    ///
    /// Files that fail validation or upload are reported individually and
    /// do not stop the rest. Only an invalid store name fails the call.
    pub async fn upload_files(
        &self,
        store: &str,
        files: Vec<IncomingFile>,
    ) -> Result<BatchUploadReport> {
        self.upload_batch(store, files.into_iter().map(Ok).collect()).await
    }

    /// [`upload_files`](Self::upload_files) with entries the caller already
    /// rejected. Those are reported as failed in their original position.
    #[instrument(skip(self, entries), fields(file_count = entries.len()))]
    pub async fn upload_batch(
        &self,
        store: &str,
        entries: Vec<std::result::Result<IncomingFile, RejectedFile>>,
    ) -> Result<BatchUploadReport> {
        let store = validate_store_name(store)?.into_value();

        let mut reports = Vec::with_capacity(entries.len());
        for entry in entries {
            let file = match entry {
                Ok(file) => file,
                Err(rejected) => {
                    warn!(store = %store, error = %rejected.error, "file rejected in batch upload");
                    reports.push(FileReport::failed(rejected.filename, &rejected.error));
                    continue;
                }
            };
            let original_name = file.filename.clone();
            match self.upload_validated_store(&store, file).await {
                Ok(receipt) => reports.push(FileReport::uploaded(&receipt)),
                Err(e) => {
                    warn!(store = %store, error = %e, "file rejected in batch upload");
                    reports.push(FileReport::failed(original_name, &e));
                }
            }
        }

        let report = BatchUploadReport::from_reports(store, reports);
        info!(
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "batch upload finished"
        );
        Ok(report)
    }

    async fn upload_validated_store(&self, store: &str, file: IncomingFile) -> Result<UploadReceipt> {
        let size_bytes = i64::try_from(file.data.len()).unwrap_or(i64::MAX);
        let (filename, info) = validate_upload_file(
            &file.filename,
            size_bytes,
            file.content_type.as_deref(),
            self.uploads.max_file_size_mb,
            &self.uploads.content_type_policy,
        )?
        .into_parts();

        let start = Instant::now();
        let result = self
            .stage_and_upload(store, &filename, &info.content_type, &file.data)
            .await;
        MetricsCollector::record_file_upload(
            store,
            info.size_bytes,
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );

        let document = result?;
        info!(store = %store, filename = %filename, size_mb = info.size_mb, "file uploaded");
        Ok(UploadReceipt {
            store: store.to_string(),
            filename,
            size_mb: info.size_mb,
            content_type: info.content_type,
            document,
        })
    }

    /// Write the bytes under a fresh staging directory and hand them to the
    /// provider. The directory is removed whether or not the upload worked.
    async fn stage_and_upload(
        &self,
        store: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String> {
        let resource = self.ensure_store(store).await?;

        let staging = tempfile::Builder::new().prefix("filesearch-").tempdir()?;
        let path = staging.path().join(filename);
        tokio::fs::write(&path, data).await?;
        debug!(path = %path.display(), "staged upload");

        let staged = StagedFile {
            path,
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            size_bytes: data.len() as u64,
        };
        let result = self.provider.upload(&resource, &staged).await;

        if let Err(e) = staging.close() {
            warn!(error = %e, "failed to remove staging directory");
        }

        let ack = result?;
        self.bump_generation(store);
        Ok(ack.document)
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Answer a query from one store.
    ///
    /// `NotFound` when the store has never been created. Served from the
    /// cache when an identical search ran against the same store contents.
    #[instrument(skip(self, query, params), fields(query_chars = query.chars().count()))]
    pub async fn search(
        &self,
        store: &str,
        query: &str,
        params: &SearchParams,
    ) -> Result<SearchResult> {
        let query = validate_query(query)?.into_value();
        validate_search_params(params.max_tokens, params.temperature)?;
        let store = validate_store_name(store)?.into_value();
        let entry = self
            .lookup(&store)
            .ok_or_else(|| FileSearchError::store_not_found(&store))?;

        let model = params
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());
        let key = SearchKey {
            store_id: &entry.resource,
            generation: entry.generation,
            query: &query,
            model: &model,
            params,
        };

        let start = Instant::now();
        let cached = match &self.cache {
            Some(cache) => cache.get(&key).await,
            None => None,
        };
        if let Some(answer) = cached {
            MetricsCollector::record_search(
                &store,
                start.elapsed().as_secs_f64(),
                answer.sources.len(),
                true,
            );
            debug!(store = %store, "search served from cache");
            return Ok(SearchResult {
                query,
                store,
                answer,
                cached: true,
            });
        }

        let result = self.provider.search(&entry.resource, &query, params).await;
        let elapsed = start.elapsed().as_secs_f64();
        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                MetricsCollector::record_search(&store, elapsed, 0, false);
                return Err(e);
            }
        };
        MetricsCollector::record_search(&store, elapsed, answer.sources.len(), true);

        if let Some(cache) = &self.cache {
            cache.insert(&key, answer.clone()).await;
        }

        Ok(SearchResult {
            query,
            store,
            answer,
            cached: false,
        })
    }
}
