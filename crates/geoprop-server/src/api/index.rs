//! Catalog-facing write endpoints that keep the search index in sync.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use geoprop_core::PropertyDocument;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_search_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct IndexedResponse {
    pub indexed: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct DeletedResponse {
    pub id: String,
    pub deleted: bool,
}

/// PUT /api/v1/index/properties/{id}
pub(super) async fn upsert_property(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<PropertyDocument>,
) -> Result<Json<ApiResponse<IndexedResponse>>, ApiError> {
    let rid = &req_id.0;
    if body.id != id {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("path id {id:?} does not match document id {:?}", body.id),
        ));
    }

    state
        .search
        .index()
        .update_property(&body)
        .await
        .map_err(|e| map_search_error(rid, "index_property", &e))?;
    tracing::info!(id = %id, status = %body.status, "property indexed");

    Ok(Json(ApiResponse::new(IndexedResponse { indexed: 1 }, req_id.0)))
}

/// POST /api/v1/index/properties (bulk upsert)
pub(super) async fn index_properties(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<Vec<PropertyDocument>>,
) -> Result<Json<ApiResponse<IndexedResponse>>, ApiError> {
    state
        .search
        .index()
        .index_properties(&body)
        .await
        .map_err(|e| map_search_error(&req_id.0, "index_properties", &e))?;
    tracing::info!(count = body.len(), "properties indexed");

    Ok(Json(ApiResponse::new(
        IndexedResponse {
            indexed: body.len(),
        },
        req_id.0,
    )))
}

/// DELETE /api/v1/index/properties/{id}
pub(super) async fn delete_property(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    state
        .search
        .index()
        .delete_property(&id)
        .await
        .map_err(|e| map_search_error(&req_id.0, "delete_property", &e))?;
    tracing::info!(id = %id, "property removed from index");

    Ok(Json(ApiResponse::new(
        DeletedResponse { id, deleted: true },
        req_id.0,
    )))
}
