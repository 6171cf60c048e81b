//! Property-level operations on top of a [`SearchBackend`].

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use geoprop_core::{
    resolve_localized, PropertyDocument, PropertyStatus, SearchFilters, SearchOptions,
    ValidationError,
};
use serde::Serialize;

use crate::backend::{IndexHits, IndexQuery, SearchBackend};
use crate::error::SearchError;
use crate::filter::FilterExpr;
use crate::schema::IndexSettings;

/// Facets are computed client-side over at most this many matching hits, so
/// counts are approximate for larger result sets.
pub const FACET_SAMPLE_SIZE: usize = 1000;

/// Distinct values kept per facet field.
pub const FACET_TOP_N: usize = 20;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;
pub const MAX_SUGGESTION_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub types: Vec<FacetCount>,
    pub countries: Vec<FacetCount>,
    pub cities: Vec<FacetCount>,
    /// `None` when nothing matched.
    pub price_range: Option<PriceRange>,
}

/// The property search index: schema, writes, and read helpers.
#[derive(Clone)]
pub struct PropertyIndex {
    backend: Arc<dyn SearchBackend>,
    settings: IndexSettings,
}

impl PropertyIndex {
    #[must_use]
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            settings: IndexSettings::default(),
        }
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Creates the index or reconfirms its settings.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the backend rejects the index or settings.
    pub async fn initialize(&self) -> Result<(), SearchError> {
        self.backend.ensure_index(&self.settings).await
    }

    /// # Errors
    ///
    /// Returns [`SearchError`] if the backend write fails.
    pub async fn index_property(&self, document: &PropertyDocument) -> Result<(), SearchError> {
        self.index_properties(std::slice::from_ref(document)).await
    }

    /// Upserts a batch keyed by id.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for a document with a blank id, or
    /// the backend's error.
    pub async fn index_properties(&self, documents: &[PropertyDocument]) -> Result<(), SearchError> {
        if let Some(doc) = documents.iter().find(|d| d.id.trim().is_empty()) {
            return Err(ValidationError::invalid_field(
                "id",
                format!("document with owner {:?} has an empty id", doc.owner_id),
            )
            .into());
        }
        if documents.is_empty() {
            return Ok(());
        }
        self.backend.upsert(documents).await?;
        tracing::debug!(count = documents.len(), "indexed properties");
        Ok(())
    }

    /// Same as [`PropertyIndex::index_property`]: the whole projection is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the backend write fails.
    pub async fn update_property(&self, document: &PropertyDocument) -> Result<(), SearchError> {
        self.index_property(document).await
    }

    /// # Errors
    ///
    /// Returns [`SearchError`] if the backend delete fails.
    pub async fn delete_property(&self, id: &str) -> Result<(), SearchError> {
        if id.trim().is_empty() {
            return Err(ValidationError::invalid_field("id", "must not be empty").into());
        }
        self.backend.delete(id).await?;
        tracing::debug!(id, "deleted property from index");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the backend error when the index is unreachable.
    pub async fn health(&self) -> Result<(), SearchError> {
        self.backend.health().await
    }

    /// Runs a validated text + filter query with the effective sort order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for invalid filters, or the backend's error.
    pub async fn search(
        &self,
        text: &str,
        filters: &SearchFilters,
        options: &SearchOptions,
    ) -> Result<IndexHits, SearchError> {
        filters.validate()?;
        let query = IndexQuery {
            text: text.trim().to_string(),
            filter: FilterExpr::from_filters(filters),
            sort: options.effective_sort(),
            limit: options.limit,
            offset: options.offset,
        };
        self.backend.search(&query).await
    }

    /// Listed properties matching `text`, titled in `language`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn get_suggestions(
        &self,
        text: &str,
        limit: Option<usize>,
        language: &str,
    ) -> Result<Vec<Suggestion>, SearchError> {
        let limit = limit
            .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
            .clamp(1, MAX_SUGGESTION_LIMIT);
        let filters = SearchFilters {
            status: Some(PropertyStatus::Listed),
            ..SearchFilters::default()
        };
        let options = SearchOptions {
            limit,
            ..SearchOptions::default()
        };
        let hits = self.search(text, &filters, &options).await?;
        Ok(hits
            .hits
            .into_iter()
            .map(|doc| Suggestion {
                title: resolve_localized(&doc.title, language).unwrap_or_default(),
                id: doc.id,
                city: doc.city,
            })
            .collect())
    }

    /// Value counts for type, country and city plus the price range, over
    /// up to [`FACET_SAMPLE_SIZE`] listed hits.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for invalid filters, or the backend's error.
    pub async fn get_facets(
        &self,
        text: Option<&str>,
        filters: &SearchFilters,
    ) -> Result<Facets, SearchError> {
        let filters = SearchFilters {
            status: Some(PropertyStatus::Listed),
            ..filters.clone()
        };
        let options = SearchOptions {
            limit: FACET_SAMPLE_SIZE,
            ..SearchOptions::default()
        };
        let hits = self
            .search(text.unwrap_or_default(), &filters, &options)
            .await?;
        if hits.total > hits.hits.len() {
            tracing::debug!(
                total = hits.total,
                sampled = hits.hits.len(),
                "facets computed over a capped sample"
            );
        }
        Ok(compute_facets(&hits.hits))
    }
}

fn top_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<FacetCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value).or_default() += 1;
    }
    let mut counts: Vec<FacetCount> = counts
        .into_iter()
        .map(|(value, count)| FacetCount {
            value: value.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| {
        Reverse(a.count)
            .cmp(&Reverse(b.count))
            .then_with(|| a.value.cmp(&b.value))
    });
    counts.truncate(FACET_TOP_N);
    counts
}

#[must_use]
pub fn compute_facets(documents: &[PropertyDocument]) -> Facets {
    let price_range = documents
        .iter()
        .map(|d| d.price)
        .filter(|p| p.is_finite())
        .fold(None, |range: Option<PriceRange>, price| {
            Some(match range {
                None => PriceRange {
                    min: price,
                    max: price,
                },
                Some(r) => PriceRange {
                    min: r.min.min(price),
                    max: r.max.max(price),
                },
            })
        });

    Facets {
        types: top_counts(documents.iter().map(|d| d.property_type.as_str())),
        countries: top_counts(documents.iter().filter_map(|d| d.country.as_deref())),
        cities: top_counts(documents.iter().filter_map(|d| d.city.as_deref())),
        price_range,
    }
}

#[cfg(test)]
#[path = "adapter_test.rs"]
mod tests;
