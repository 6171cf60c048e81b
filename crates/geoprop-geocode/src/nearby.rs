//! Radius search against the external property catalog.
//!
//! The catalog returns candidates inside (roughly) the requested radius. This
//! client recomputes exact great-circle distances, discards anything outside
//! the circle, and orders the rest nearest first. Any upstream failure
//! degrades to an empty result.

use std::time::Duration;

use geoprop_core::haversine_km;
use geoprop_core::PropertyDocument;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::GeocodeError;
use crate::types::{NearbyProperty, NearbyQuery, NearbyResults};

#[derive(Debug, Deserialize)]
struct CatalogNearbyResponse {
    #[serde(default)]
    properties: Vec<PropertyDocument>,
    #[serde(default)]
    total: Option<usize>,
}

/// HTTP client for `GET {base}/properties/nearby`.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn nearby_url(&self, query: &NearbyQuery) -> Result<Url, GeocodeError> {
        let mut url = Url::parse(&format!("{}/properties/nearby", self.base_url)).map_err(|e| {
            GeocodeError::Misconfiguration(format!(
                "invalid CATALOG_BASE_URL '{}': {e}",
                self.base_url
            ))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("lat", &query.latitude.to_string())
                .append_pair("lon", &query.longitude.to_string())
                .append_pair("radiusKm", &query.radius_km.to_string())
                .append_pair("limit", &query.limit.to_string())
                .append_pair("offset", &query.offset.to_string());
            if let Some(status) = query.status.as_deref() {
                pairs.append_pair("status", status);
            }
        }
        Ok(url)
    }

    async fn fetch(&self, query: &NearbyQuery) -> Result<CatalogNearbyResponse, GeocodeError> {
        let url = self.nearby_url(query)?;
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
            context: "catalog nearby response".to_string(),
            source: e,
        })
    }

    /// Candidates within `query.radius_km`, nearest first.
    ///
    /// `total` is the catalog's own match count (never less than the page
    /// returned), not the number of candidates that survived the distance
    /// filter. Never fails: errors are logged and yield an empty result.
    pub async fn nearby(&self, query: &NearbyQuery) -> NearbyResults {
        match self.fetch(query).await {
            Ok(response) => {
                let upstream_total = response.total;
                let received = response.properties.len();
                let properties = annotate_and_sort(
                    response.properties,
                    query.latitude,
                    query.longitude,
                    query.radius_km,
                );
                let dropped = received - properties.len();
                if dropped > 0 {
                    tracing::debug!(
                        received,
                        dropped,
                        radius_km = query.radius_km,
                        "dropped catalog candidates without coordinates or outside the radius"
                    );
                }
                let total = upstream_total.unwrap_or(properties.len()).max(properties.len());
                NearbyResults { properties, total }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    lat = query.latitude,
                    lon = query.longitude,
                    radius_km = query.radius_km,
                    "catalog nearby search failed; returning empty result"
                );
                NearbyResults::default()
            }
        }
    }
}

/// Attaches Haversine distance, drops uncoordinated or out-of-radius
/// candidates, and sorts ascending by distance.
#[must_use]
pub fn annotate_and_sort(
    candidates: Vec<PropertyDocument>,
    latitude: f64,
    longitude: f64,
    radius_km: f64,
) -> Vec<NearbyProperty> {
    let mut annotated: Vec<NearbyProperty> = candidates
        .into_iter()
        .filter_map(|property| {
            let (lat, lon) = property.coordinates()?;
            let distance_km = haversine_km(latitude, longitude, lat, lon);
            (distance_km <= radius_km).then_some(NearbyProperty {
                property,
                distance_km,
            })
        })
        .collect();
    annotated.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    annotated
}
