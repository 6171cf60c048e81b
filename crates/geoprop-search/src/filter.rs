//! Structured filters as an expression tree, rendered to the index's filter
//! syntax or evaluated in process.

use std::fmt;

use geoprop_core::{haversine_km, BoundingBox, PropertyDocument, SearchFilters};

/// One boolean clause, or a conjunction of clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Case-insensitive string equality on a filterable attribute.
    Eq { field: &'static str, value: String },
    Gte { field: &'static str, value: f64 },
    Lte { field: &'static str, value: f64 },
    /// Within `radius_m` metres of a point.
    GeoRadius { lat: f64, lng: f64, radius_m: f64 },
    GeoBoundingBox(BoundingBox),
    And(Vec<FilterExpr>),
}

impl FilterExpr {
    /// Builds one clause per present filter field, joined with AND.
    ///
    /// Returns `None` when no field is set. Input should already be validated;
    /// a partial geo radius is ignored here.
    #[must_use]
    pub fn from_filters(filters: &SearchFilters) -> Option<Self> {
        let mut clauses = Vec::new();
        let mut eq = |field: &'static str, value: Option<&str>| {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                clauses.push(FilterExpr::Eq {
                    field,
                    value: value.to_string(),
                });
            }
        };
        eq("status", filters.status.map(|s| s.as_str()));
        eq("type", filters.property_type.as_deref());
        eq("country", filters.country.as_deref());
        eq("city", filters.city.as_deref());
        eq("region", filters.region.as_deref());
        eq("currency", filters.currency.as_deref());
        eq("ownerId", filters.owner_id.as_deref());

        if let Some(value) = filters.min_price {
            clauses.push(FilterExpr::Gte {
                field: "price",
                value,
            });
        }
        if let Some(value) = filters.max_price {
            clauses.push(FilterExpr::Lte {
                field: "price",
                value,
            });
        }
        if let (Some(lat), Some(lng), Some(radius_km)) =
            (filters.latitude, filters.longitude, filters.radius_km)
        {
            clauses.push(FilterExpr::GeoRadius {
                lat,
                lng,
                radius_m: radius_km * 1000.0,
            });
        }
        if let Some(bbox) = filters.bbox {
            clauses.push(FilterExpr::GeoBoundingBox(bbox));
        }

        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(FilterExpr::And(clauses)),
        }
    }

    /// Evaluates the expression against a document.
    #[must_use]
    pub fn matches(&self, doc: &PropertyDocument) -> bool {
        match self {
            FilterExpr::Eq { field, value } => text_attribute(doc, field)
                .is_some_and(|actual| actual.to_lowercase() == value.to_lowercase()),
            FilterExpr::Gte { field, value } => {
                numeric_attribute(doc, field).is_some_and(|actual| actual >= *value)
            }
            FilterExpr::Lte { field, value } => {
                numeric_attribute(doc, field).is_some_and(|actual| actual <= *value)
            }
            FilterExpr::GeoRadius { lat, lng, radius_m } => {
                doc.coordinates().is_some_and(|(doc_lat, doc_lng)| {
                    haversine_km(*lat, *lng, doc_lat, doc_lng) * 1000.0 <= *radius_m
                })
            }
            FilterExpr::GeoBoundingBox(bbox) => doc
                .coordinates()
                .is_some_and(|(lat, lng)| bbox.contains(lat, lng)),
            FilterExpr::And(clauses) => clauses.iter().all(|clause| clause.matches(doc)),
        }
    }
}

fn text_attribute<'a>(doc: &'a PropertyDocument, field: &str) -> Option<&'a str> {
    match field {
        "id" => Some(doc.id.as_str()),
        "status" => Some(doc.status.as_str()),
        "type" => Some(doc.property_type.as_str()),
        "country" => doc.country.as_deref(),
        "city" => doc.city.as_deref(),
        "region" => doc.region.as_deref(),
        "currency" => Some(doc.currency.as_str()),
        "ownerId" => Some(doc.owner_id.as_str()),
        _ => None,
    }
}

fn numeric_attribute(doc: &PropertyDocument, field: &str) -> Option<f64> {
    match field {
        "price" => Some(doc.price),
        _ => None,
    }
}

/// Quotes a string literal, escaping `\` and `"`.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Eq { field, value } => write!(f, "{field} = {}", quote(value)),
            FilterExpr::Gte { field, value } => write!(f, "{field} >= {value}"),
            FilterExpr::Lte { field, value } => write!(f, "{field} <= {value}"),
            FilterExpr::GeoRadius { lat, lng, radius_m } => {
                write!(f, "_geoRadius({lat}, {lng}, {radius_m})")
            }
            // Top-right corner first, then bottom-left.
            FilterExpr::GeoBoundingBox(bbox) => write!(
                f,
                "_geoBoundingBox([{}, {}], [{}, {}])",
                bbox.max_lat, bbox.max_lon, bbox.min_lat, bbox.min_lon
            ),
            FilterExpr::And(clauses) => {
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    if matches!(clause, FilterExpr::And(_)) {
                        write!(f, "({clause})")?;
                    } else {
                        write!(f, "{clause}")?;
                    }
                }
                Ok(())
            }
        }
    }
}
