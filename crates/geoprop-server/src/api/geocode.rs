use axum::{
    extract::{Query, State},
    Extension, Json,
};
use geoprop_core::{geo::round_to, query::normalize_limit, ValidationError};
use geoprop_geocode::{
    BatchGeocodeItem, BatchGeocodeOutcome, BatchSummary, GeocodeResult, GeocodeService,
    NearbyQuery, NearbyResults, ReverseGeocodeResult,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_geocode_error, validation_error, ApiError, ApiResponse, AppState};

fn required(value: Option<f64>, field: &str) -> Result<f64, ValidationError> {
    value.ok_or_else(|| ValidationError::invalid_field(field, "is required"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GeocodeParams {
    pub address: Option<String>,
    #[serde(alias = "countryHint")]
    pub country: Option<String>,
}

/// GET /api/v1/geocode
pub(super) async fn geocode_address(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<GeocodeParams>,
) -> Result<Json<ApiResponse<GeocodeResult>>, ApiError> {
    let rid = &req_id.0;
    let address = params.address.unwrap_or_default();

    let result = state
        .geocode
        .geocode(&address, params.country.as_deref())
        .await
        .map_err(|e| map_geocode_error(rid, "geocode", &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "no match for address"))?;

    Ok(Json(ApiResponse::new(result, req_id.0)))
}

#[derive(Debug, Deserialize)]
pub(super) struct CoordinateParams {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// GET /api/v1/geocode/reverse
pub(super) async fn reverse_geocode(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<CoordinateParams>,
) -> Result<Json<ApiResponse<ReverseGeocodeResult>>, ApiError> {
    let rid = &req_id.0;
    let lat = required(params.lat, "lat").map_err(|e| validation_error(rid, &e))?;
    let lon = required(params.lon, "lon").map_err(|e| validation_error(rid, &e))?;

    let result = state
        .geocode
        .reverse_geocode(lat, lon)
        .await
        .map_err(|e| map_geocode_error(rid, "reverse_geocode", &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "no address at coordinates"))?;

    Ok(Json(ApiResponse::new(result, req_id.0)))
}

#[derive(Debug, Deserialize)]
pub(super) struct DistanceParams {
    pub lat1: Option<f64>,
    pub lon1: Option<f64>,
    pub lat2: Option<f64>,
    pub lon2: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DistanceResponse {
    pub distance_km: f64,
}

fn distance_between(params: &DistanceParams) -> Result<f64, ValidationError> {
    let km = GeocodeService::calculate_distance(
        required(params.lat1, "lat1")?,
        required(params.lon1, "lon1")?,
        required(params.lat2, "lat2")?,
        required(params.lon2, "lon2")?,
    )?;
    Ok(round_to(km, 2))
}

/// GET /api/v1/geocode/distance
pub(super) async fn distance(
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<DistanceParams>,
) -> Result<Json<ApiResponse<DistanceResponse>>, ApiError> {
    let distance_km = distance_between(&params).map_err(|e| validation_error(&req_id.0, &e))?;
    Ok(Json(ApiResponse::new(
        DistanceResponse { distance_km },
        req_id.0,
    )))
}

#[derive(Debug, Deserialize)]
pub(super) struct BatchRequest {
    pub items: Vec<BatchGeocodeItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct BatchResponse {
    pub results: Vec<BatchGeocodeOutcome>,
    pub summary: BatchSummary,
}

/// POST /api/v1/geocode/batch
pub(super) async fn batch_geocode(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<ApiResponse<BatchResponse>>, ApiError> {
    let results = state
        .geocode
        .batch_geocode(body.items)
        .await
        .map_err(|e| map_geocode_error(&req_id.0, "batch_geocode", &e))?;
    let summary = BatchSummary::from_outcomes(&results);
    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        not_found = summary.not_found,
        failed = summary.failed,
        "batch geocode finished"
    );

    Ok(Json(ApiResponse::new(
        BatchResponse { results, summary },
        req_id.0,
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NearbyParams {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub status: Option<String>,
}

impl NearbyParams {
    fn query(&self) -> Result<NearbyQuery, ValidationError> {
        Ok(NearbyQuery {
            latitude: required(self.lat, "lat")?,
            longitude: required(self.lon, "lon")?,
            radius_km: required(self.radius_km, "radiusKm")?,
            limit: normalize_limit(self.limit),
            offset: self.offset.unwrap_or(0),
            status: self
                .status
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned),
        })
    }
}

/// GET /api/v1/geocode/nearby
pub(super) async fn nearby_search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<ApiResponse<NearbyResults>>, ApiError> {
    let rid = &req_id.0;
    let query = params.query().map_err(|e| validation_error(rid, &e))?;

    let results = state
        .geocode
        .nearby_search(&query)
        .await
        .map_err(|e| map_geocode_error(rid, "nearby_search", &e))?;

    Ok(Json(ApiResponse::new(results, req_id.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_rounded_to_two_decimals() {
        let params = DistanceParams {
            lat1: Some(48.8566),
            lon1: Some(2.3522),
            lat2: Some(51.5074),
            lon2: Some(-0.1278),
        };
        let km = distance_between(&params).unwrap();
        assert!((343.0..=345.0).contains(&km));
        assert!((km * 100.0 - (km * 100.0).round()).abs() < 1e-6);
    }

    #[test]
    fn distance_requires_every_coordinate() {
        let params = DistanceParams {
            lat1: Some(1.0),
            lon1: Some(1.0),
            lat2: None,
            lon2: Some(1.0),
        };
        assert_eq!(
            distance_between(&params),
            Err(ValidationError::invalid_field("lat2", "is required"))
        );
    }
}
