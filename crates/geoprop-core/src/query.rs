//! Per-request search value objects.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geo::{validate_latitude, validate_longitude, validate_radius_km, BoundingBox};
use crate::property::PropertyStatus;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

/// Structured filters; every present field narrows the result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub status: Option<PropertyStatus>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub currency: Option<String>,
    pub owner_id: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
    pub bbox: Option<BoundingBox>,
}

impl SearchFilters {
    /// # Errors
    ///
    /// Returns [`ValidationError`] for partial geo-radius input, out-of-range
    /// coordinates, an invalid radius or box, or an inverted price range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.latitude, self.longitude, self.radius_km) {
            (None, None, None) => {}
            (Some(lat), Some(lon), Some(radius)) => {
                validate_latitude(lat)?;
                validate_longitude(lon)?;
                validate_radius_km(radius)?;
            }
            _ => return Err(ValidationError::IncompleteGeoFilter),
        }

        if let Some(bbox) = &self.bbox {
            bbox.validate()?;
        }

        for (field, value) in [("minPrice", self.min_price), ("maxPrice", self.max_price)] {
            if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
                return Err(ValidationError::invalid_field(
                    field,
                    "must be a non-negative number",
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ValidationError::invalid_field(
                    "minPrice",
                    format!("{min} is greater than maxPrice {max}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Price,
    CreatedAt,
    UpdatedAt,
    PublishedAt,
}

impl SortField {
    pub const ALL: [SortField; 4] = [
        SortField::Price,
        SortField::CreatedAt,
        SortField::UpdatedAt,
        SortField::PublishedAt,
    ];

    /// Attribute name in the index document.
    #[must_use]
    pub fn attribute(self) -> &'static str {
        match self {
            SortField::Price => "price",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::PublishedAt => "publishedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    #[must_use]
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Parses `price:desc`; the order defaults to ascending when omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for non-sortable fields or unknown orders.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let (name, order) = raw.trim().split_once(':').unwrap_or((raw.trim(), "asc"));
        let field = SortField::ALL
            .into_iter()
            .find(|f| f.attribute() == name.trim())
            .ok_or_else(|| {
                ValidationError::invalid_field("sort", format!("{name:?} is not sortable"))
            })?;
        let order = match order.trim().to_ascii_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => {
                return Err(ValidationError::invalid_field(
                    "sort",
                    format!("unknown sort order {other:?}"),
                ))
            }
        };
        Ok(Self { field, order })
    }

    /// Parses a comma-separated list such as `price:desc,createdAt:asc`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] from [`SortSpec::parse`].
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, ValidationError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl std::fmt::Display for SortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let order = match self.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        write!(f, "{}:{order}", self.field.attribute())
    }
}

/// Pagination, ordering and language for one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub limit: usize,
    pub offset: usize,
    /// Empty means the default order, price ascending.
    pub sort: Vec<SortSpec>,
    pub language: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            sort: Vec::new(),
            language: None,
        }
    }
}

impl SearchOptions {
    /// Effective sort order, falling back to price ascending.
    #[must_use]
    pub fn effective_sort(&self) -> Vec<SortSpec> {
        if self.sort.is_empty() {
            vec![SortSpec::new(SortField::Price, SortOrder::Asc)]
        } else {
            self.sort.clone()
        }
    }
}

/// Clamps a caller-supplied page size to `[1, MAX_LIMIT]`.
#[must_use]
pub fn normalize_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
