use std::time::Duration;

use filesearch::cache::{CacheConfig, SearchCache, SearchKey};
use filesearch::types::{SearchAnswer, SearchParams, Source};

fn answer(text: &str) -> SearchAnswer {
    SearchAnswer {
        answer: text.to_string(),
        sources: vec![Source {
            title: "guide.txt".into(),
            uri: "doc://guide".into(),
        }],
        model: "m".into(),
    }
}

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
fn config_defaults_and_deserialization() {
    let config = CacheConfig::default();
    assert!(config.enabled);
    assert_eq!(config.max_entries, 1_000);
    assert_eq!(config.ttl, Duration::from_secs(600));

    let parsed: CacheConfig = serde_json::from_str(r#"{"ttl_secs": 30, "enabled": false}"#).unwrap();
    assert!(!parsed.enabled);
    assert_eq!(parsed.ttl, Duration::from_secs(30));
    assert_eq!(parsed.max_entries, 1_000);
}

#[tokio::test]
async fn miss_then_hit() {
    let cache = SearchCache::new(&CacheConfig::default());
    let params = SearchParams::default();

    assert!(cache.get(&key("reset", 0, &params)).await.is_none());
    cache.insert(&key("reset", 0, &params), answer("hold it")).await;
    assert_eq!(cache.get(&key("reset", 0, &params)).await, Some(answer("hold it")));
    assert_eq!(cache.entry_count(), 1);
}

#[tokio::test]
async fn new_generation_misses() {
    let cache = SearchCache::new(&CacheConfig::default());
    let params = SearchParams::default();

    cache.insert(&key("reset", 0, &params), answer("old")).await;
    assert!(cache.get(&key("reset", 1, &params)).await.is_none());
}

#[tokio::test]
async fn params_and_model_are_part_of_the_key() {
    let cache = SearchCache::new(&CacheConfig::default());
    let short = SearchParams::default().max_tokens(64);
    let long = SearchParams::default().max_tokens(1024);

    cache.insert(&key("reset", 0, &short), answer("short")).await;
    assert!(cache.get(&key("reset", 0, &long)).await.is_none());

    let other_model = SearchKey {
        model: "other",
        ..key("reset", 0, &short)
    };
    assert!(cache.get(&other_model).await.is_none());
}

#[tokio::test]
async fn entries_expire() {
    let cache = SearchCache::new(&CacheConfig::new().ttl(Duration::from_millis(50)));
    let params = SearchParams::default();

    cache.insert(&key("reset", 0, &params), answer("soon gone")).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(cache.get(&key("reset", 0, &params)).await.is_none());
}

#[tokio::test]
async fn clear_drops_everything() {
    let cache = SearchCache::new(&CacheConfig::default());
    let params = SearchParams::default();
    for q in ["a", "b", "c"] {
        cache.insert(&key(q, 0, &params), answer(q)).await;
    }
    assert_eq!(cache.entry_count(), 3);

    cache.clear().await;
    assert_eq!(cache.entry_count(), 0);
    assert!(cache.get(&key("a", 0, &params)).await.is_none());
}
