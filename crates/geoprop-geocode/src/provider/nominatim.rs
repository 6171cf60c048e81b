//! OpenStreetMap Nominatim backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{join_street, non_empty, GeocodingProvider};
use crate::error::GeocodeError;
use crate::retry::{retry_with_backoff, DEFAULT_BACKOFF_BASE_MS};
use crate::types::{GeocodeResult, ReverseGeocodeResult};

const PROVIDER: &str = "nominatim";

/// Nominatim has no tiered precision signal.
const DEFAULT_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    postcode: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

/// Client for a Nominatim instance (public or self-hosted).
pub struct NominatimProvider {
    client: Client,
    base_url: String,
    max_retries: u32,
}

impl NominatimProvider {
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built, or
    /// [`GeocodeError::Misconfiguration`] for a blank user agent.
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, GeocodeError> {
        // The public instance's usage policy rejects anonymous clients.
        if user_agent.trim().is_empty() {
            return Err(GeocodeError::Misconfiguration(
                "GEOCODING_USER_AGENT must identify the application for Nominatim".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, GeocodeError> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url)).map_err(|e| {
            GeocodeError::Misconfiguration(format!(
                "invalid Nominatim base URL '{}': {e}",
                self.base_url
            ))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("format", "jsonv2");
            pairs.append_pair("addressdetails", "1");
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &Url) -> Result<T, GeocodeError> {
        retry_with_backoff(PROVIDER, self.max_retries, DEFAULT_BACKOFF_BASE_MS, || async move {
            let response = self.client.get(url.clone()).send().await?;
            match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(GeocodeError::Misconfiguration(format!(
                        "Nominatim refused the request with {}; check GEOCODING_USER_AGENT and NOMINATIM_BASE_URL",
                        response.status()
                    )));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    return Err(GeocodeError::Upstream {
                        provider: PROVIDER,
                        message: "rate limited".to_string(),
                        retriable: true,
                    });
                }
                _ => {}
            }
            let body = response.error_for_status()?.text().await?;
            serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
                context: format!("nominatim {}", url.path()),
                source: e,
            })
        })
        .await
    }
}

fn parse_coordinate(raw: &str, field: &str) -> Result<f64, GeocodeError> {
    raw.trim().parse::<f64>().map_err(|e| GeocodeError::Upstream {
        provider: PROVIDER,
        message: format!("non-numeric {field} {raw:?}: {e}"),
        retriable: false,
    })
}

fn into_geocode_result(place: NominatimPlace) -> Result<GeocodeResult, GeocodeError> {
    let latitude = parse_coordinate(&place.lat, "lat")?;
    let longitude = parse_coordinate(&place.lon, "lon")?;
    let address = place.address.unwrap_or_default();
    let city = address
        .city
        .or(address.town)
        .or(address.village)
        .or(address.municipality);

    Ok(GeocodeResult {
        latitude,
        longitude,
        formatted_address: place.display_name,
        street: join_street(address.house_number.as_deref(), address.road.as_deref()),
        postal_code: non_empty(address.postcode.as_deref()),
        city: non_empty(city.as_deref()),
        region: non_empty(address.state.as_deref()),
        country: non_empty(address.country.as_deref()),
        country_code: non_empty(address.country_code.as_deref()).map(|c| c.to_uppercase()),
        confidence: DEFAULT_CONFIDENCE,
    })
}

#[async_trait]
impl GeocodingProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn geocode(
        &self,
        address: &str,
        country_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, GeocodeError> {
        let hint = country_hint.map(str::to_lowercase);
        let mut params = vec![("q", address), ("limit", "1")];
        if let Some(hint) = hint.as_deref() {
            params.push(("countrycodes", hint));
        }
        let url = self.endpoint("search", &params)?;
        let places: Vec<NominatimPlace> = self.fetch(&url).await?;
        places.into_iter().next().map(into_geocode_result).transpose()
    }

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<ReverseGeocodeResult>, GeocodeError> {
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let url = self.endpoint("reverse", &[("lat", lat.as_str()), ("lon", lon.as_str())])?;
        let body: serde_json::Value = self.fetch(&url).await?;

        // "Unable to geocode" comes back as 200 with an `error` field.
        if body.get("error").is_some() {
            return Ok(None);
        }
        let place: NominatimPlace =
            serde_json::from_value(body).map_err(|e| GeocodeError::Deserialize {
                context: "nominatim reverse".to_string(),
                source: e,
            })?;
        Ok(Some(into_geocode_result(place)?.into()))
    }
}
