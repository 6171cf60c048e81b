mod geocode;
mod index;
mod search;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use geoprop_core::ValidationError;
use geoprop_geocode::{GeocodeError, GeocodeService};
use geoprop_search::{SearchError, SearchService};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::middleware::{enforce_rate_limit, request_id, RateLimitState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub geocode: GeocodeService,
    pub search: SearchService,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    search_index: &'static str,
    geocoding_provider: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn validation_error(request_id: &str, error: &ValidationError) -> ApiError {
    ApiError::new(request_id, "validation_error", error.to_string())
}

pub(super) fn map_geocode_error(request_id: &str, operation: &str, error: &GeocodeError) -> ApiError {
    match error {
        GeocodeError::Validation(e) => validation_error(request_id, e),
        GeocodeError::Misconfiguration(message) => {
            tracing::error!(operation, error = %error, "geocoding provider misconfigured");
            ApiError::new(request_id, "misconfigured", message.clone())
        }
        _ => {
            tracing::warn!(operation, error = %error, "geocoding upstream failed");
            ApiError::new(
                request_id,
                "upstream_unavailable",
                "geocoding provider unavailable",
            )
        }
    }
}

pub(super) fn map_search_error(request_id: &str, operation: &str, error: &SearchError) -> ApiError {
    match error {
        SearchError::Validation(e) => validation_error(request_id, e),
        SearchError::Misconfiguration(message) => {
            tracing::error!(operation, error = %error, "search index misconfigured");
            ApiError::new(request_id, "misconfigured", message.clone())
        }
        _ => {
            tracing::warn!(operation, error = %error, "search index request failed");
            ApiError::new(request_id, "upstream_unavailable", "search index unavailable")
        }
    }
}

/// CORS from the configured allow-list. An empty list allows any origin in
/// development and none elsewhere.
fn build_cors(allowed_origins: &[String], is_development: bool) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() && is_development {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT_LANGUAGE,
            HeaderName::from_static("x-request-id"),
        ])
}

fn api_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/properties/search", get(search::search_properties))
        .route(
            "/api/v1/properties/suggestions",
            get(search::list_suggestions),
        )
        .route("/api/v1/properties/facets", get(search::get_facets))
        .route("/api/v1/properties/clusters", get(search::list_clusters))
        .route("/api/v1/index/properties", post(index::index_properties))
        .route(
            "/api/v1/index/properties/{id}",
            put(index::upsert_property).delete(index::delete_property),
        )
        .route("/api/v1/geocode", get(geocode::geocode_address))
        .route("/api/v1/geocode/reverse", get(geocode::reverse_geocode))
        .route("/api/v1/geocode/distance", get(geocode::distance))
        .route("/api/v1/geocode/batch", post(geocode::batch_geocode))
        .route("/api/v1/geocode/nearby", get(geocode::nearby_search))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(
    state: AppState,
    rate_limit: RateLimitState,
    allowed_origins: &[String],
    is_development: bool,
) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(api_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors(allowed_origins, is_development))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let geocoding_provider = state.geocode.provider_name();

    match state.search.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::new(
                HealthData {
                    status: "ok",
                    search_index: "ok",
                    geocoding_provider,
                },
                req_id.0,
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: search index unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::new(
                    HealthData {
                        status: "degraded",
                        search_index: "unavailable",
                        geocoding_provider,
                    },
                    req_id.0,
                )),
            )
        }
    }
}
