//! Builder for configuring service instances

use std::sync::Arc;

use parking_lot::RwLock;

use super::{FileSearchService, UploadPolicy};
use crate::cache::{CacheConfig, SearchCache};
use crate::metrics::MetricsCollector;
use crate::providers::{RetryConfig, RetryingSearchProvider, SearchProvider};
use crate::validation::ContentTypePolicy;

/// Builder for [`FileSearchService`].
///
/// ```rust
/// # use std::sync::Arc;
/// # use filesearch::{CacheConfig, FileSearchService, MemoryProvider, RetryConfig};
/// let service = FileSearchService::builder(Arc::new(MemoryProvider::new()))
///     .max_file_size_mb(10.0)
///     .retry(RetryConfig::disabled())
///     .cache(CacheConfig::new().max_entries(100))
///     .build();
/// assert_eq!(service.store_count(), 0);
/// ```
pub struct FileSearchServiceBuilder {
    provider: Arc<dyn SearchProvider>,
    uploads: UploadPolicy,
    retry: Option<RetryConfig>,
    cache: Option<CacheConfig>,
}

impl FileSearchServiceBuilder {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            uploads: UploadPolicy::default(),
            retry: None,
            cache: None,
        }
    }

    /// Per-file upload limit in MB. Default: 50.
    pub fn max_file_size_mb(mut self, max_mb: f64) -> Self {
        self.uploads.max_file_size_mb = max_mb;
        self
    }

    pub fn content_type_policy(mut self, policy: ContentTypePolicy) -> Self {
        self.uploads.content_type_policy = policy;
        self
    }

    pub fn upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.uploads = policy;
        self
    }

    /// Wrap the provider in a [`RetryingSearchProvider`].
    ///
    /// Without this, provider errors are returned on the first failure.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Enable the search cache. A config with `enabled = false` is ignored.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(config);
        self
    }

    pub fn build(self) -> FileSearchService {
        let provider = match self.retry {
            Some(config) if config.max_attempts > 1 => {
                Arc::new(RetryingSearchProvider::new(self.provider, config)) as Arc<dyn SearchProvider>
            }
            _ => self.provider,
        };
        let cache = self
            .cache
            .filter(|config| config.enabled)
            .map(|config| SearchCache::new(&config));

        // Registry starts empty; publish the gauge before the first store.
        MetricsCollector::update_stores_count(0);

        FileSearchService {
            provider,
            stores: RwLock::new(Default::default()),
            create_lock: tokio::sync::Mutex::new(()),
            cache,
            uploads: self.uploads,
        }
    }
}
