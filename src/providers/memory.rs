//! In-process provider for offline mode and tests.
//!
//! Documents are kept in memory as text and matched by keyword overlap.
//! There is no embedding and no generation: the "answer" is the best
//! matching line of the best matching document. Good enough to exercise the
//! whole upload/search path without network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::traits::SearchProvider;
use crate::types::{SearchAnswer, SearchParams, Source, StagedFile, UploadAck};
use crate::{FileSearchError, Result};

const MODEL: &str = "offline-keyword";
const MAX_SOURCES: usize = 5;
const MAX_ANSWER_CHARS: usize = 300;

/// Answer returned when no document matches.
pub const NO_MATCH_ANSWER: &str = "No relevant content found in the uploaded documents.";

struct Document {
    title: String,
    uri: String,
    text: String,
}

/// Keyword-matching provider backed by a map of stores.
#[derive(Default)]
pub struct MemoryProvider {
    stores: RwLock<HashMap<String, Vec<Document>>>,
    next_id: AtomicU64,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a store, or `None` if the store does not exist.
    pub fn document_count(&self, store_id: &str) -> Option<usize> {
        self.stores.read().get(store_id).map(Vec::len)
    }
}

#[async_trait]
impl SearchProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn default_model(&self) -> &str {
        MODEL
    }

    async fn create_store(&self, _display_name: &str) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let store_id = format!("memoryStores/{id}");
        self.stores.write().insert(store_id.clone(), Vec::new());
        Ok(store_id)
    }

    async fn upload(&self, store_id: &str, file: &StagedFile) -> Result<UploadAck> {
        let bytes = tokio::fs::read(&file.path).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let mut stores = self.stores.write();
        let documents = stores
            .get_mut(store_id)
            .ok_or_else(|| FileSearchError::store_not_found(store_id))?;
        let uri = format!("memory://{store_id}/{}", file.filename);
        documents.retain(|d| d.uri != uri);
        documents.push(Document {
            title: file.filename.clone(),
            uri: uri.clone(),
            text,
        });
        Ok(UploadAck { document: uri })
    }

    async fn search(
        &self,
        store_id: &str,
        query: &str,
        _params: &SearchParams,
    ) -> Result<SearchAnswer> {
        let terms = terms(query);
        let stores = self.stores.read();
        let documents = stores
            .get(store_id)
            .ok_or_else(|| FileSearchError::store_not_found(store_id))?;

        let mut scored: Vec<(usize, &Document)> = documents
            .iter()
            .map(|doc| (score(&doc.text, &terms), doc))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable sort keeps upload order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let answer = scored
            .first()
            .and_then(|(_, doc)| best_line(&doc.text, &terms))
            .unwrap_or_else(|| NO_MATCH_ANSWER.to_string());

        let sources = scored
            .iter()
            .take(MAX_SOURCES)
            .map(|(_, doc)| Source {
                title: doc.title.clone(),
                uri: doc.uri.clone(),
            })
            .collect();

        Ok(SearchAnswer {
            answer,
            sources,
            model: MODEL.to_string(),
        })
    }

    async fn delete_store(&self, store_id: &str) -> Result<()> {
        self.stores
            .write()
            .remove(store_id)
            .map(|_| ())
            .ok_or_else(|| FileSearchError::store_not_found(store_id))
    }
}

fn terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn score(text: &str, terms: &[String]) -> usize {
    let text = text.to_lowercase();
    terms.iter().filter(|t| text.contains(t.as_str())).count()
}

fn best_line(text: &str, terms: &[String]) -> Option<String> {
    let (line, line_score) = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| (l, score(l, terms)))
        .max_by_key(|(_, s)| *s)?;
    (line_score > 0).then(|| line.chars().take(MAX_ANSWER_CHARS).collect())
}
