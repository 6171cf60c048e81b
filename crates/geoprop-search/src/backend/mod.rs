//! Storage engines behind the property index.

mod meili;
mod memory;

use async_trait::async_trait;
use geoprop_core::{PropertyDocument, SortSpec};

use crate::error::SearchError;
use crate::filter::FilterExpr;
use crate::schema::IndexSettings;

pub use meili::MeiliBackend;
pub use memory::MemoryBackend;

/// One text + filter + sort request against the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    /// Free text; empty matches every document.
    pub text: String,
    pub filter: Option<FilterExpr>,
    pub sort: Vec<SortSpec>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexHits {
    pub hits: Vec<PropertyDocument>,
    /// Matching documents across all pages (may be an estimate).
    pub total: usize,
    pub processing_time_ms: u64,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Creates the index if needed and (re)applies `settings`. Idempotent.
    async fn ensure_index(&self, settings: &IndexSettings) -> Result<(), SearchError>;

    /// Inserts or replaces documents by `id`.
    async fn upsert(&self, documents: &[PropertyDocument]) -> Result<(), SearchError>;

    /// Removes a document; deleting an unknown id succeeds.
    async fn delete(&self, id: &str) -> Result<(), SearchError>;

    async fn search(&self, query: &IndexQuery) -> Result<IndexHits, SearchError>;

    /// Cheap reachability check.
    async fn health(&self) -> Result<(), SearchError>;
}
