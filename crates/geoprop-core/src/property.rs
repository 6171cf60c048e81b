use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Language code to text. Ordered so the fallback value is reproducible.
pub type LocalizedText = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Draft,
    Review,
    Listed,
    Flagged,
    Archived,
}

impl PropertyStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyStatus::Draft => "draft",
            PropertyStatus::Review => "review",
            PropertyStatus::Listed => "listed",
            PropertyStatus::Flagged => "flagged",
            PropertyStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PropertyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(PropertyStatus::Draft),
            "review" => Ok(PropertyStatus::Review),
            "listed" => Ok(PropertyStatus::Listed),
            "flagged" => Ok(PropertyStatus::Flagged),
            "archived" => Ok(PropertyStatus::Archived),
            other => Err(format!("unknown property status {other:?}")),
        }
    }
}

/// Catalog projection of a property, as pushed to the search index.
///
/// `id` is the index primary key; every upsert with the same `id` replaces
/// the previous projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDocument {
    pub id: String,
    pub owner_id: String,
    pub status: PropertyStatus,
    #[serde(rename = "type")]
    pub property_type: String,
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl PropertyDocument {
    /// Coordinates when both are present and finite.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PropertyStatus::Draft,
            PropertyStatus::Review,
            PropertyStatus::Listed,
            PropertyStatus::Flagged,
            PropertyStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<PropertyStatus>(), Ok(status));
        }
        assert!("sold".parse::<PropertyStatus>().is_err());
    }

    #[test]
    fn document_deserializes_from_catalog_json() {
        let doc: PropertyDocument = serde_json::from_value(serde_json::json!({
            "id": "p-1",
            "ownerId": "u-9",
            "status": "listed",
            "type": "apartment",
            "price": 250000.0,
            "currency": "EUR",
            "latitude": 48.85,
            "longitude": 2.35,
            "city": "Paris",
            "title": { "fr": "Appartement", "en": "Apartment" },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        }))
        .expect("deserialize");

        assert_eq!(doc.status, PropertyStatus::Listed);
        assert_eq!(doc.property_type, "apartment");
        assert_eq!(doc.coordinates(), Some((48.85, 2.35)));
        assert!(doc.description.is_empty());
        assert!(doc.published_at.is_none());
    }
}
