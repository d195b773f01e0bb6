//! Caching subsystem.
//!
//! - [`SearchCache`]: opt-in LRU + TTL cache of provider answers, consulted
//!   by [`FileSearchService::search`](crate::FileSearchService::search)
//!   before calling the provider. See [`search`] module docs for the key
//!   design and invalidation.

pub mod search;

pub use search::{CacheConfig, SearchCache, SearchKey};
