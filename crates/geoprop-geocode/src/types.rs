use geoprop_core::PropertyDocument;
use serde::{Deserialize, Serialize};

/// Canonical forward-geocoding result, whichever provider produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Provider confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Address found at a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseGeocodeResult {
    pub formatted_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl From<GeocodeResult> for ReverseGeocodeResult {
    fn from(result: GeocodeResult) -> Self {
        Self {
            formatted_address: result.formatted_address,
            street: result.street,
            postal_code: result.postal_code,
            city: result.city,
            region: result.region,
            country: result.country,
            country_code: result.country_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGeocodeItem {
    pub id: String,
    pub address: String,
    #[serde(default, alias = "country")]
    pub country_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchGeocodeOutcome {
    pub id: String,
    pub result: Option<GeocodeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl BatchSummary {
    #[must_use]
    pub fn from_outcomes(outcomes: &[BatchGeocodeOutcome]) -> Self {
        outcomes.iter().fold(
            Self {
                total: outcomes.len(),
                ..Self::default()
            },
            |mut summary, outcome| {
                match (&outcome.result, &outcome.error) {
                    (_, Some(_)) => summary.failed += 1,
                    (Some(_), None) => summary.succeeded += 1,
                    (None, None) => summary.not_found += 1,
                }
                summary
            },
        )
    }
}

/// Radius query forwarded to the property catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub limit: usize,
    pub offset: usize,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyProperty {
    #[serde(flatten)]
    pub property: PropertyDocument,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NearbyResults {
    /// Sorted nearest first.
    pub properties: Vec<NearbyProperty>,
    /// Catalog-reported match count across all pages.
    pub total: usize,
}
