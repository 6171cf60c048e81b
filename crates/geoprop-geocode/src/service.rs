//! Geocode orchestrator: provider + cache + distance math + batch + nearby.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use geoprop_core::geo::{validate_radius_km, Coordinates};
use geoprop_core::{AppConfig, CacheBackend, ValidationError};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{address_cache_key, reverse_cache_key, GeocodeCache, MemoryCache};
use crate::error::GeocodeError;
use crate::nearby::CatalogClient;
use crate::provider::{build_provider, GeocodingProvider};
use crate::types::{
    BatchGeocodeItem, BatchGeocodeOutcome, GeocodeResult, NearbyQuery, NearbyResults,
    ReverseGeocodeResult,
};

/// Largest batch accepted by [`GeocodeService::batch_geocode`].
pub const MAX_BATCH_SIZE: usize = 100;

const FORWARD_NAMESPACE: &str = "geocode";
const REVERSE_NAMESPACE: &str = "reverse";

/// Read-through caching front for a [`GeocodingProvider`].
#[derive(Clone)]
pub struct GeocodeService {
    provider: Arc<dyn GeocodingProvider>,
    cache: Arc<dyn GeocodeCache>,
    ttl: Duration,
    batch_concurrency: usize,
    catalog: Option<CatalogClient>,
}

impl GeocodeService {
    #[must_use]
    pub fn new(
        provider: Arc<dyn GeocodingProvider>,
        cache: Arc<dyn GeocodeCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            ttl,
            batch_concurrency: 1,
            catalog: None,
        }
    }

    /// Items geocoded in flight at once during a batch. Zero is treated as one.
    #[must_use]
    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: CatalogClient) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Wires provider, cache backend, and catalog bridge from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if an HTTP client cannot be built, or
    /// [`GeocodeError::Misconfiguration`] for unusable provider settings.
    pub fn from_config(config: &AppConfig) -> Result<Self, GeocodeError> {
        let provider = build_provider(config)?;
        let cache: Arc<dyn GeocodeCache> = match config.geocode_cache_backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new()),
        };
        let mut service = Self::new(
            provider,
            cache,
            Duration::from_secs(config.geocode_cache_ttl_secs),
        )
        .with_batch_concurrency(config.geocode_batch_concurrency);

        match config.catalog_base_url.as_deref() {
            Some(base_url) => {
                service = service.with_catalog(CatalogClient::new(
                    base_url,
                    config.catalog_timeout_secs,
                )?);
            }
            None => tracing::info!("CATALOG_BASE_URL not set; nearby search will return no results"),
        }
        Ok(service)
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Forward geocode with read-through caching. `Ok(None)` means no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Validation`] for a blank address, otherwise
    /// whatever the provider reports.
    pub async fn geocode(
        &self,
        address: &str,
        country_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        if address.trim().is_empty() {
            return Err(ValidationError::invalid_field("address", "must not be empty").into());
        }
        let country_hint = country_hint.map(str::trim).filter(|h| !h.is_empty());
        let key = format!(
            "{FORWARD_NAMESPACE}:{}",
            address_cache_key(address, country_hint)
        );
        self.read_through(&key, || self.provider.geocode(address, country_hint))
            .await
    }

    /// Reverse geocode with read-through caching keyed on a ~11 m cell.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Validation`] for out-of-range coordinates,
    /// otherwise whatever the provider reports.
    pub async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<ReverseGeocodeResult>, GeocodeError> {
        Coordinates::new(latitude, longitude)?;
        let key = format!(
            "{REVERSE_NAMESPACE}:{}",
            reverse_cache_key(latitude, longitude)
        );
        self.read_through(&key, || self.provider.reverse_geocode(latitude, longitude))
            .await
    }

    /// Great-circle distance in kilometres, unrounded.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if either point is out of range.
    pub fn calculate_distance(
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    ) -> Result<f64, ValidationError> {
        let from = Coordinates::new(lat1, lon1)?;
        let to = Coordinates::new(lat2, lon2)?;
        Ok(from.distance_km(&to))
    }

    /// Geocodes every item, preserving input order.
    ///
    /// A failing item yields `{id, result: null, error}` and never aborts the
    /// rest of the batch.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Validation`] when the batch exceeds
    /// [`MAX_BATCH_SIZE`].
    pub async fn batch_geocode(
        &self,
        items: Vec<BatchGeocodeItem>,
    ) -> Result<Vec<BatchGeocodeOutcome>, GeocodeError> {
        if items.len() > MAX_BATCH_SIZE {
            return Err(ValidationError::invalid_field(
                "items",
                format!("at most {MAX_BATCH_SIZE} items per batch, got {}", items.len()),
            )
            .into());
        }

        // `buffered` yields in submission order regardless of completion order.
        let outcomes = stream::iter(items)
            .map(|item| async move {
                let outcome = self
                    .geocode(&item.address, item.country_hint.as_deref())
                    .await;
                match outcome {
                    Ok(result) => BatchGeocodeOutcome {
                        id: item.id,
                        result,
                        error: None,
                    },
                    Err(e) => {
                        tracing::warn!(id = %item.id, error = %e, "batch geocode item failed");
                        BatchGeocodeOutcome {
                            id: item.id,
                            result: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .buffered(self.batch_concurrency)
            .collect::<Vec<_>>()
            .await;
        Ok(outcomes)
    }

    /// Distance-sorted catalog candidates inside the radius.
    ///
    /// Degrades to an empty result when the catalog is unconfigured or fails.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Validation`] for an invalid centre or radius.
    pub async fn nearby_search(&self, query: &NearbyQuery) -> Result<NearbyResults, GeocodeError> {
        Coordinates::new(query.latitude, query.longitude)?;
        validate_radius_km(query.radius_km)?;
        match &self.catalog {
            Some(catalog) => Ok(catalog.nearby(query).await),
            None => {
                tracing::debug!("nearby search requested without a catalog; returning empty");
                Ok(NearbyResults::default())
            }
        }
    }

    async fn read_through<T, F, Fut>(&self, key: &str, fetch: F) -> Result<Option<T>, GeocodeError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Option<T>, GeocodeError>>,
    {
        if let Some(raw) = self.cache.get(key).await {
            match serde_json::from_str::<T>(&raw) {
                Ok(hit) => {
                    tracing::debug!(key, "geocode cache hit");
                    return Ok(Some(hit));
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "discarding undecodable geocode cache entry");
                }
            }
        }

        let fetched = fetch().await.inspect_err(|e| {
            tracing::warn!(
                key,
                provider = self.provider.name(),
                error = %e,
                "geocoding provider call failed"
            );
        })?;

        // Misses are not cached so a later lookup can succeed.
        if let Some(value) = &fetched {
            match serde_json::to_string(value) {
                Ok(raw) => self.cache.set(key, raw, self.ttl).await,
                Err(e) => tracing::warn!(key, error = %e, "failed to encode geocode cache entry"),
            }
        }
        Ok(fetched)
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
