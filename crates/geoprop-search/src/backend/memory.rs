//! In-process index for tests, demos, and running without Meilisearch.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use geoprop_core::{PropertyDocument, SortField, SortOrder, SortSpec};
use tokio::sync::RwLock;

use super::{IndexHits, IndexQuery, SearchBackend};
use crate::error::SearchError;
use crate::schema::IndexSettings;

/// Documents keyed by id, searched by linear scan.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: RwLock<BTreeMap<String, PropertyDocument>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn get(&self, id: &str) -> Option<PropertyDocument> {
        self.documents.read().await.get(id).cloned()
    }
}

fn haystack(doc: &PropertyDocument) -> String {
    let mut parts: Vec<&str> = Vec::new();
    parts.extend(doc.title.values().map(String::as_str));
    parts.extend(doc.description.values().map(String::as_str));
    parts.extend(
        [
            &doc.city,
            &doc.country,
            &doc.region,
            &doc.street,
            &doc.postal_code,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str),
    );
    parts.join(" ").to_lowercase()
}

fn matches_text(doc: &PropertyDocument, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let haystack = haystack(doc);
    terms.iter().all(|term| haystack.contains(term.as_str()))
}

/// Documents without the sort attribute go last in either direction.
fn compare(a: &PropertyDocument, b: &PropertyDocument, spec: &SortSpec) -> Ordering {
    let ordering = match spec.field {
        SortField::Price => a.price.total_cmp(&b.price),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::PublishedAt => match (a.published_at, b.published_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    match spec.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_index(&self, _settings: &IndexSettings) -> Result<(), SearchError> {
        Ok(())
    }

    async fn upsert(&self, documents: &[PropertyDocument]) -> Result<(), SearchError> {
        let mut store = self.documents.write().await;
        for doc in documents {
            store.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), SearchError> {
        self.documents.write().await.remove(id);
        Ok(())
    }

    async fn search(&self, query: &IndexQuery) -> Result<IndexHits, SearchError> {
        let started = Instant::now();
        let terms: Vec<String> = query
            .text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let store = self.documents.read().await;
        let mut matched: Vec<&PropertyDocument> = store
            .values()
            .filter(|doc| matches_text(doc, &terms))
            .filter(|doc| query.filter.as_ref().is_none_or(|f| f.matches(doc)))
            .collect();

        matched.sort_by(|a, b| {
            query
                .sort
                .iter()
                .map(|spec| compare(a, b, spec))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });

        let total = matched.len();
        let hits = matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();

        Ok(IndexHits {
            hits,
            total,
            processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn health(&self) -> Result<(), SearchError> {
        Ok(())
    }
}
