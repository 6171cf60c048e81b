//! Public search entry point: language resolution over index results.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use geoprop_core::{
    cluster_documents, cluster_within_bounds, resolve_language, resolve_localized, AppConfig,
    BoundingBox, ClusterOptions, ClusterPoint, GeoTagged, PropertyDocument, PropertyStatus,
    SearchFilters, SearchOptions,
};
use serde::Serialize;

use crate::adapter::{Facets, PropertyIndex, Suggestion};
use crate::backend::{MeiliBackend, SearchBackend};
use crate::error::SearchError;

/// Hits fetched for one cluster request.
pub const CLUSTER_SAMPLE_SIZE: usize = 1000;

/// A search hit with its multilingual fields resolved to one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedProperty {
    pub id: String,
    pub owner_id: String,
    pub status: PropertyStatus,
    #[serde(rename = "type")]
    pub property_type: String,
    pub price: f64,
    pub currency: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub media_urls: Vec<String>,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl LocalizedProperty {
    #[must_use]
    pub fn from_document(doc: PropertyDocument, language: &str) -> Self {
        Self {
            title: resolve_localized(&doc.title, language).unwrap_or_default(),
            description: resolve_localized(&doc.description, language).unwrap_or_default(),
            id: doc.id,
            owner_id: doc.owner_id,
            status: doc.status,
            property_type: doc.property_type,
            price: doc.price,
            currency: doc.currency,
            latitude: doc.latitude,
            longitude: doc.longitude,
            street: doc.street,
            postal_code: doc.postal_code,
            city: doc.city,
            region: doc.region,
            country: doc.country,
            media_urls: doc.media_urls,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            published_at: doc.published_at,
        }
    }
}

impl GeoTagged for LocalizedProperty {
    fn position(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub properties: Vec<LocalizedProperty>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub processing_time_ms: u64,
    pub query: String,
}

/// Composes the index with request language handling.
#[derive(Clone)]
pub struct SearchService {
    index: PropertyIndex,
    default_language: String,
}

impl SearchService {
    #[must_use]
    pub fn new(index: PropertyIndex, default_language: impl Into<String>) -> Self {
        Self {
            index,
            default_language: default_language.into(),
        }
    }

    /// Meilisearch-backed service from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the backend cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, SearchError> {
        let backend: Arc<dyn SearchBackend> = Arc::new(MeiliBackend::new(
            &config.search_index_url,
            config.search_index_api_key.as_deref(),
            &config.search_index_name,
            config.search_index_timeout_secs,
        )?);
        Ok(Self::new(
            PropertyIndex::new(backend),
            config.default_language.clone(),
        ))
    }

    #[must_use]
    pub fn index(&self) -> &PropertyIndex {
        &self.index
    }

    /// Explicit option, then `Accept-Language`, then the configured default.
    #[must_use]
    pub fn language_for(&self, explicit: Option<&str>, accept_language: Option<&str>) -> String {
        resolve_language(explicit, accept_language, &self.default_language)
    }

    /// Public search. A missing status filter means listed properties only.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for invalid filters, or the index error.
    pub async fn search_properties(
        &self,
        query: &str,
        filters: &SearchFilters,
        options: &SearchOptions,
        accept_language: Option<&str>,
    ) -> Result<SearchResponse, SearchError> {
        let filters = with_public_status(filters);
        let language = self.language_for(options.language.as_deref(), accept_language);
        let hits = self.index.search(query, &filters, options).await?;
        tracing::debug!(
            query,
            total = hits.total,
            language = %language,
            processing_time_ms = hits.processing_time_ms,
            "search completed"
        );

        Ok(SearchResponse {
            properties: hits
                .hits
                .into_iter()
                .map(|doc| LocalizedProperty::from_document(doc, &language))
                .collect(),
            total: hits.total,
            limit: options.limit,
            offset: options.offset,
            processing_time_ms: hits.processing_time_ms,
            query: query.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns the index error.
    pub async fn suggestions(
        &self,
        query: &str,
        limit: Option<usize>,
        language: Option<&str>,
        accept_language: Option<&str>,
    ) -> Result<Vec<Suggestion>, SearchError> {
        let language = self.language_for(language, accept_language);
        self.index.get_suggestions(query, limit, &language).await
    }

    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for invalid filters, or the index error.
    pub async fn facets(
        &self,
        query: Option<&str>,
        filters: &SearchFilters,
    ) -> Result<Facets, SearchError> {
        self.index.get_facets(query, filters).await
    }

    /// Map markers for listed properties, optionally restricted to `bbox`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for an invalid box, or the index error.
    pub async fn clusters(
        &self,
        query: &str,
        bbox: Option<BoundingBox>,
        cluster_options: &ClusterOptions,
        language: &str,
    ) -> Result<Vec<ClusterPoint<LocalizedProperty>>, SearchError> {
        let filters = SearchFilters {
            status: Some(PropertyStatus::Listed),
            bbox,
            ..SearchFilters::default()
        };
        let options = SearchOptions {
            limit: CLUSTER_SAMPLE_SIZE,
            ..SearchOptions::default()
        };
        let hits = self.index.search(query, &filters, &options).await?;
        let documents: Vec<LocalizedProperty> = hits
            .hits
            .into_iter()
            .map(|doc| LocalizedProperty::from_document(doc, language))
            .collect();

        Ok(match bbox {
            Some(bbox) => cluster_within_bounds(&documents, &bbox, cluster_options),
            None => cluster_documents(&documents, cluster_options),
        })
    }

    /// # Errors
    ///
    /// Returns the backend error when the index is unreachable.
    pub async fn health(&self) -> Result<(), SearchError> {
        self.index.health().await
    }
}

fn with_public_status(filters: &SearchFilters) -> SearchFilters {
    let mut filters = filters.clone();
    filters.status.get_or_insert(PropertyStatus::Listed);
    filters
}
