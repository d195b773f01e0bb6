//! Opt-in cache of search answers.
//!
//! Provider searches are slow and billed per call, and the same question is
//! often asked repeatedly against a store that has not changed. Entries are
//! keyed on a content hash of (store, store generation, query, model,
//! generation parameters). The service bumps a store's generation whenever
//! documents are added, so stale answers are never served after an upload.
//! A deleted store loses its registry entry; re-creating it yields a new
//! provider resource id, which keys a fresh set of entries. Orphaned
//! entries age out under the TTL.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;

use crate::metrics::MetricsCollector;
use crate::types::{SearchAnswer, SearchParams};

/// Configuration for the search cache.
///
/// ```rust
/// # use filesearch::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(5_000)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether searches are cached at all. Default: true.
    pub enabled: bool,
    /// Maximum number of cached answers. Default: 1,000.
    pub max_entries: u64,
    /// Time-to-live for cached answers. Default: 10 minutes.
    #[serde(rename = "ttl_secs", deserialize_with = "seconds")]
    pub ttl: Duration,
}

fn seconds<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1_000,
            ttl: Duration::from_secs(600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Everything a cached answer depends on.
#[derive(Debug, Clone, Copy)]
pub struct SearchKey<'a> {
    pub store_id: &'a str,
    pub generation: u64,
    pub query: &'a str,
    pub model: &'a str,
    pub params: &'a SearchParams,
}

/// In-memory LRU + TTL cache of provider answers.
pub struct SearchCache {
    cache: Cache<u64, SearchAnswer>,
}

impl SearchCache {
    /// Value of the `cache` metric label.
    pub const NAME: &'static str = "search";

    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    /// Look up an answer. Emits cache hit/miss metrics.
    pub async fn get(&self, key: &SearchKey<'_>) -> Option<SearchAnswer> {
        let hit = self.cache.get(&cache_key(key)).await;
        match hit {
            Some(_) => MetricsCollector::record_cache_hit(Self::NAME),
            None => MetricsCollector::record_cache_miss(Self::NAME),
        }
        hit
    }

    /// Store an answer and refresh the cache size gauge.
    pub async fn insert(&self, key: &SearchKey<'_>, answer: SearchAnswer) {
        self.cache.insert(cache_key(key), answer).await;
        self.cache.run_pending_tasks().await;
        MetricsCollector::update_cache_size(Self::NAME, self.cache.entry_count());
    }

    /// Approximate number of entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        MetricsCollector::update_cache_size(Self::NAME, 0);
    }
}

/// SipHash over every key component. Deterministic within a process,
/// which is all an in-memory cache needs.
fn cache_key(key: &SearchKey<'_>) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.store_id.hash(&mut hasher);
    key.generation.hash(&mut hasher);
    key.query.hash(&mut hasher);
    key.model.hash(&mut hasher);
    key.params.max_tokens.hash(&mut hasher);
    key.params.temperature.map(f32::to_bits).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key<'a>(query: &'a str, generation: u64, params: &'a SearchParams) -> SearchKey<'a> {
        SearchKey {
            store_id: "fileSearchStores/a",
            generation,
            query,
            model: "m",
            params,
        }
    }

    #[test]
    fn cache_key_deterministic() {
        let params = SearchParams::default();
        assert_eq!(
            cache_key(&key("q", 0, &params)),
            cache_key(&key("q", 0, &params))
        );
    }

    #[test]
    fn cache_key_differs_on_generation() {
        let params = SearchParams::default();
        assert_ne!(
            cache_key(&key("q", 0, &params)),
            cache_key(&key("q", 1, &params))
        );
    }

    #[test]
    fn cache_key_differs_on_params() {
        let a = SearchParams::default().temperature(0.2);
        let b = SearchParams::default().temperature(0.3);
        assert_ne!(cache_key(&key("q", 0, &a)), cache_key(&key("q", 0, &b)));
    }
}
