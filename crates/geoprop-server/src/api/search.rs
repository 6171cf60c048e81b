use axum::{
    extract::{Query, State},
    http::{header::ACCEPT_LANGUAGE, HeaderMap},
    Extension, Json,
};
use geoprop_core::{
    query::normalize_limit, BoundingBox, ClusterOptions, ClusterPoint, PropertyStatus,
    SearchFilters, SearchOptions, SortSpec, ValidationError,
};
use geoprop_search::{Facets, LocalizedProperty, SearchResponse, Suggestion};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_search_error, validation_error, ApiError, ApiResponse, AppState};

/// Query string shared by search and facets.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchParams {
    pub q: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub currency: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
    pub min_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lat: Option<f64>,
    pub max_lon: Option<f64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<String>,
    pub language: Option<String>,
}

fn bbox_from(
    min_lat: Option<f64>,
    min_lon: Option<f64>,
    max_lat: Option<f64>,
    max_lon: Option<f64>,
) -> Result<Option<BoundingBox>, ValidationError> {
    match (min_lat, min_lon, max_lat, max_lon) {
        (None, None, None, None) => Ok(None),
        (Some(min_lat), Some(min_lon), Some(max_lat), Some(max_lon)) => {
            let bbox = BoundingBox {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            };
            bbox.validate()?;
            Ok(Some(bbox))
        }
        _ => Err(ValidationError::invalid_field(
            "bbox",
            "minLat, minLon, maxLat and maxLon must be given together",
        )),
    }
}

fn parse_status(raw: Option<&str>) -> Result<Option<PropertyStatus>, ValidationError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<PropertyStatus>()
                .map_err(|reason| ValidationError::invalid_field("status", reason))
        })
        .transpose()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

impl SearchParams {
    fn filters(&self) -> Result<SearchFilters, ValidationError> {
        Ok(SearchFilters {
            status: parse_status(self.status.as_deref())?,
            property_type: non_blank(self.property_type.as_deref()),
            country: non_blank(self.country.as_deref()),
            city: non_blank(self.city.as_deref()),
            region: non_blank(self.region.as_deref()),
            currency: non_blank(self.currency.as_deref()),
            owner_id: None,
            min_price: self.min_price,
            max_price: self.max_price,
            latitude: self.lat,
            longitude: self.lon,
            radius_km: self.radius_km,
            bbox: bbox_from(self.min_lat, self.min_lon, self.max_lat, self.max_lon)?,
        })
    }

    fn options(&self) -> Result<SearchOptions, ValidationError> {
        Ok(SearchOptions {
            limit: normalize_limit(self.limit),
            offset: self.offset.unwrap_or(0),
            sort: self
                .sort
                .as_deref()
                .map(SortSpec::parse_list)
                .transpose()?
                .unwrap_or_default(),
            language: non_blank(self.language.as_deref()),
        })
    }

    fn text(&self) -> &str {
        self.q.as_deref().map_or("", str::trim)
    }
}

fn accept_language(headers: &HeaderMap) -> Option<&str> {
    headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok())
}

/// GET /api/v1/properties/search
pub(super) async fn search_properties(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchResponse>>, ApiError> {
    let rid = &req_id.0;
    let filters = params.filters().map_err(|e| validation_error(rid, &e))?;
    let options = params.options().map_err(|e| validation_error(rid, &e))?;

    let response = state
        .search
        .search_properties(params.text(), &filters, &options, accept_language(&headers))
        .await
        .map_err(|e| map_search_error(rid, "search", &e))?;

    Ok(Json(ApiResponse::new(response, req_id.0)))
}

#[derive(Debug, Deserialize)]
pub(super) struct SuggestionParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub language: Option<String>,
}

/// GET /api/v1/properties/suggestions
pub(super) async fn list_suggestions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<ApiResponse<Vec<Suggestion>>>, ApiError> {
    let suggestions = state
        .search
        .suggestions(
            params.q.as_deref().unwrap_or_default(),
            params.limit,
            params.language.as_deref(),
            accept_language(&headers),
        )
        .await
        .map_err(|e| map_search_error(&req_id.0, "suggestions", &e))?;

    Ok(Json(ApiResponse::new(suggestions, req_id.0)))
}

/// GET /api/v1/properties/facets
pub(super) async fn get_facets(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Facets>>, ApiError> {
    let rid = &req_id.0;
    let filters = params.filters().map_err(|e| validation_error(rid, &e))?;
    let text = Some(params.text()).filter(|t| !t.is_empty());

    let facets = state
        .search
        .facets(text, &filters)
        .await
        .map_err(|e| map_search_error(rid, "facets", &e))?;

    Ok(Json(ApiResponse::new(facets, req_id.0)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ClusterParams {
    pub q: Option<String>,
    pub zoom: Option<f64>,
    pub max_clusters: Option<usize>,
    pub inclusion_threshold: Option<usize>,
    pub language: Option<String>,
    pub min_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lat: Option<f64>,
    pub max_lon: Option<f64>,
}

impl ClusterParams {
    fn options(&self) -> Result<ClusterOptions, ValidationError> {
        let defaults = ClusterOptions::default();
        let zoom = self.zoom.unwrap_or(defaults.zoom);
        if !zoom.is_finite() {
            return Err(ValidationError::invalid_field("zoom", "must be a finite number"));
        }
        let max_clusters = self.max_clusters.unwrap_or(defaults.max_clusters);
        if max_clusters == 0 {
            return Err(ValidationError::invalid_field("maxClusters", "must be at least 1"));
        }
        Ok(ClusterOptions {
            zoom,
            max_clusters,
            inclusion_threshold: self
                .inclusion_threshold
                .unwrap_or(defaults.inclusion_threshold),
        })
    }
}

/// GET /api/v1/properties/clusters
pub(super) async fn list_clusters(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(params): Query<ClusterParams>,
) -> Result<Json<ApiResponse<Vec<ClusterPoint<LocalizedProperty>>>>, ApiError> {
    let rid = &req_id.0;
    let options = params.options().map_err(|e| validation_error(rid, &e))?;
    let bbox = bbox_from(params.min_lat, params.min_lon, params.max_lat, params.max_lon)
        .map_err(|e| validation_error(rid, &e))?;
    let language = state
        .search
        .language_for(params.language.as_deref(), accept_language(&headers));

    let clusters = state
        .search
        .clusters(
            params.q.as_deref().map_or("", str::trim),
            bbox,
            &options,
            &language,
        )
        .await
        .map_err(|e| map_search_error(rid, "clusters", &e))?;

    Ok(Json(ApiResponse::new(clusters, req_id.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_bbox_is_rejected() {
        assert!(bbox_from(Some(1.0), None, None, None).is_err());
        assert_eq!(bbox_from(None, None, None, None), Ok(None));
        assert!(bbox_from(Some(50.0), Some(2.0), Some(40.0), Some(3.0)).is_err());
    }

    #[test]
    fn search_params_build_filters_and_options() {
        let params = SearchParams {
            q: Some("  loft ".to_string()),
            status: Some("Listed".to_string()),
            city: Some(" ".to_string()),
            limit: Some(500),
            sort: Some("price:desc,createdAt".to_string()),
            ..SearchParams::default()
        };
        let filters = params.filters().unwrap();
        assert_eq!(filters.status, Some(PropertyStatus::Listed));
        assert_eq!(filters.city, None);

        let options = params.options().unwrap();
        assert_eq!(options.limit, 100);
        assert_eq!(options.sort.len(), 2);
        assert_eq!(params.text(), "loft");
    }

    #[test]
    fn unknown_status_and_sort_are_validation_errors() {
        let params = SearchParams {
            status: Some("sold".to_string()),
            sort: Some("bedrooms:asc".to_string()),
            ..SearchParams::default()
        };
        assert!(params.filters().is_err());
        assert!(params.options().is_err());
    }
}
