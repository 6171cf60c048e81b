//! Geocoding provider abstraction and the concrete backends.

mod google;
mod nominatim;
mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use geoprop_core::{AppConfig, GeocodingProviderKind};

use crate::error::GeocodeError;
use crate::types::{GeocodeResult, ReverseGeocodeResult};

pub use google::GoogleProvider;
pub use nominatim::NominatimProvider;
pub use stub::StubProvider;

/// Address to coordinate translation, and back.
///
/// Implementations map their provider-specific payloads into the canonical
/// result types. A lookup with no match returns `Ok(None)`; errors are
/// reserved for misconfiguration and upstream failure.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Short identifier used in logs and responses.
    fn name(&self) -> &'static str;

    async fn geocode(
        &self,
        address: &str,
        country_hint: Option<&str>,
    ) -> Result<Option<GeocodeResult>, GeocodeError>;

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<ReverseGeocodeResult>, GeocodeError>;
}

/// Builds the provider selected by `config`, once, at startup.
///
/// Google without an API key falls back to [`StubProvider`] with a warning so
/// development environments work without credentials.
///
/// # Errors
///
/// Returns [`GeocodeError::Http`] if an HTTP client cannot be constructed.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn GeocodingProvider>, GeocodeError> {
    let provider: Arc<dyn GeocodingProvider> = match config.geocoding_provider {
        GeocodingProviderKind::Google => match config.google_maps_api_key.as_deref() {
            Some(key) => Arc::new(GoogleProvider::new(
                key,
                config.geocoding_timeout_secs,
                config.geocoding_max_retries,
            )?),
            None => {
                tracing::warn!(
                    "GEOCODING_PROVIDER=google but GOOGLE_MAPS_API_KEY is not set; using stub provider"
                );
                Arc::new(StubProvider::new())
            }
        },
        GeocodingProviderKind::Nominatim => Arc::new(NominatimProvider::new(
            &config.nominatim_base_url,
            &config.geocoding_user_agent,
            config.geocoding_timeout_secs,
            config.geocoding_max_retries,
        )?),
        GeocodingProviderKind::Stub => Arc::new(StubProvider::new()),
    };
    tracing::info!(provider = provider.name(), "geocoding provider selected");
    Ok(provider)
}

/// Drops empty strings coming back from providers.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Joins house number and street name the way postal addresses read.
pub(crate) fn join_street(number: Option<&str>, route: Option<&str>) -> Option<String> {
    match (non_empty(number), non_empty(route)) {
        (Some(number), Some(route)) => Some(format!("{number} {route}")),
        (None, Some(route)) => Some(route),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_street_handles_missing_parts() {
        assert_eq!(
            join_street(Some("10"), Some("Downing Street")).as_deref(),
            Some("10 Downing Street")
        );
        assert_eq!(
            join_street(None, Some("Rue de Rivoli")).as_deref(),
            Some("Rue de Rivoli")
        );
        assert_eq!(join_street(Some("5"), None), None);
        assert_eq!(join_street(Some(" "), Some(" ")), None);
    }
}
