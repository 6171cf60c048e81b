//! Google Maps Geocoding API backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{join_street, non_empty, GeocodingProvider};
use crate::error::GeocodeError;
use crate::retry::{retry_with_backoff, DEFAULT_BACKOFF_BASE_MS};
use crate::types::{GeocodeResult, ReverseGeocodeResult};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const PROVIDER: &str = "google";

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: GoogleGeometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: LatLng,
    #[serde(default)]
    location_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

/// Client for the Google Geocoding API.
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
}

impl GoogleProvider {
    /// # Errors
    ///
    /// Returns [`GeocodeError::Misconfiguration`] for a blank key, or
    /// [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, timeout_secs: u64, max_retries: u32) -> Result<Self, GeocodeError> {
        Self::with_base_url(api_key, timeout_secs, max_retries, DEFAULT_BASE_URL)
    }

    /// Same as [`GoogleProvider::new`] against a custom endpoint (for wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Misconfiguration`] for a blank key or invalid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        base_url: &str,
    ) -> Result<Self, GeocodeError> {
        if api_key.trim().is_empty() {
            return Err(GeocodeError::Misconfiguration(
                "GOOGLE_MAPS_API_KEY is empty".to_string(),
            ));
        }
        let base_url = Url::parse(base_url).map_err(|e| {
            GeocodeError::Misconfiguration(format!("invalid Google base URL '{base_url}': {e}"))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_owned(),
            base_url,
            max_retries,
        })
    }

    fn build_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("key", &self.api_key);
        }
        url
    }

    async fn request(&self, url: &Url) -> Result<Option<GoogleResult>, GeocodeError> {
        retry_with_backoff(PROVIDER, self.max_retries, DEFAULT_BACKOFF_BASE_MS, || async move {
            let response = self.client.get(url.clone()).send().await?;
            let body = response.error_for_status()?.text().await?;
            let parsed: GoogleResponse =
                serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
                    context: "google geocode response".to_string(),
                    source: e,
                })?;
            interpret_status(parsed)
        })
        .await
    }
}

/// Maps the API `status` field to a result, a "no match", or a typed error.
fn interpret_status(response: GoogleResponse) -> Result<Option<GoogleResult>, GeocodeError> {
    let message = || {
        response
            .error_message
            .clone()
            .unwrap_or_else(|| response.status.clone())
    };
    match response.status.as_str() {
        "OK" => Ok(response.results.into_iter().next()),
        "ZERO_RESULTS" => Ok(None),
        "REQUEST_DENIED" | "OVER_DAILY_LIMIT" => Err(GeocodeError::Misconfiguration(format!(
            "Google rejected the API key: {}",
            message()
        ))),
        "INVALID_REQUEST" if mentions_api_key(response.error_message.as_deref()) => Err(
            GeocodeError::Misconfiguration(format!("Google rejected the API key: {}", message())),
        ),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(GeocodeError::Upstream {
            provider: PROVIDER,
            message: message(),
            retriable: true,
        }),
        _ => Err(GeocodeError::Upstream {
            provider: PROVIDER,
            message: message(),
            retriable: false,
        }),
    }
}

fn mentions_api_key(error_message: Option<&str>) -> bool {
    error_message.is_some_and(|m| m.to_ascii_lowercase().contains("key"))
}

/// Confidence band for Google's `location_type`.
fn confidence_for(location_type: Option<&str>) -> f64 {
    match location_type {
        Some("ROOFTOP") => 0.95,
        Some("RANGE_INTERPOLATED") => 0.85,
        Some("GEOMETRIC_CENTER") => 0.7,
        _ => 0.5,
    }
}

fn component<'a>(components: &'a [AddressComponent], kind: &str) -> Option<&'a AddressComponent> {
    components.iter().find(|c| c.types.iter().any(|t| t == kind))
}

fn into_geocode_result(result: GoogleResult) -> GeocodeResult {
    let components = &result.address_components;
    let long = |kind: &str| component(components, kind).map(|c| c.long_name.as_str());

    GeocodeResult {
        latitude: result.geometry.location.lat,
        longitude: result.geometry.location.lng,
        street: join_street(long("street_number"), long("route")),
        postal_code: non_empty(long("postal_code")),
        city: non_empty(long("locality").or_else(|| long("postal_town"))),
        region: non_empty(long("administrative_area_level_1")),
        country: non_empty(long("country")),
        country_code: non_empty(component(components, "country").map(|c| c.short_name.as_str())),
        confidence: confidence_for(result.geometry.location_type.as_deref()),
        formatted_address: result.formatted_address,
    }
}

#[async_trait]
impl GeocodingProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn geocode(
        &self,
        address: &str,
        country_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        let components = country_hint.map(|c| format!("country:{}", c.to_uppercase()));
        let mut params = vec![("address", address)];
        if let Some(components) = components.as_deref() {
            params.push(("components", components));
        }
        let url = self.build_url(&params);
        Ok(self.request(&url).await?.map(into_geocode_result))
    }

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<ReverseGeocodeResult>, GeocodeError> {
        let latlng = format!("{latitude},{longitude}");
        let url = self.build_url(&[("latlng", latlng.as_str())]);
        Ok(self
            .request(&url)
            .await?
            .map(|r| ReverseGeocodeResult::from(into_geocode_result(r))))
    }
}
