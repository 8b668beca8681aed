//! Export handlers.

use crate::api::AppState;
use crate::types::{ExportId, ExporterId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /exporters/:id/exports - List exports of an exporter
#[utoipa::path(
    get,
    path = "/api/v1/exporters/{id}/exports",
    tag = "exports",
    params(
        ("id" = i64, Path, description = "Exporter ID")
    ),
    responses(
        (status = 200, description = "Exports, oldest first", body = Vec<crate::types::ExportInfo>),
        (status = 404, description = "Exporter not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_exports(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.depot.list_exports(ExporterId(id)).await {
        Ok(exports) => (StatusCode::OK, Json(exports)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /exporters/:id/exports - Schedule an export
#[utoipa::path(
    post,
    path = "/api/v1/exporters/{id}/exports",
    tag = "exports",
    params(
        ("id" = i64, Path, description = "Exporter ID")
    ),
    responses(
        (status = 202, description = "Export task scheduled", body = crate::types::TaskInfo),
        (status = 404, description = "Exporter not found"),
        (status = 503, description = "Shutting down"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_export(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.depot.export(ExporterId(id)).await {
        Ok(task) => (StatusCode::ACCEPTED, Json(task)).into_response(),
        Err(e) => {
            tracing::warn!(exporter_id = id, error = %e, "Failed to schedule export");
            e.into_response()
        }
    }
}

/// GET /exporters/:id/exports/:export_id - Get one export
#[utoipa::path(
    get,
    path = "/api/v1/exporters/{id}/exports/{export_id}",
    tag = "exports",
    params(
        ("id" = i64, Path, description = "Exporter ID"),
        ("export_id" = i64, Path, description = "Export ID")
    ),
    responses(
        (status = 200, description = "Export", body = crate::types::ExportInfo),
        (status = 404, description = "Export not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_export(
    State(state): State<AppState>,
    Path((id, export_id)): Path<(i64, i64)>,
) -> Response {
    match state
        .depot
        .get_export(ExporterId(id), ExportId(export_id))
        .await
    {
        Ok(export) => (StatusCode::OK, Json(export)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /exporters/:id/exports/:export_id - Delete an export
#[utoipa::path(
    delete,
    path = "/api/v1/exporters/{id}/exports/{export_id}",
    tag = "exports",
    params(
        ("id" = i64, Path, description = "Exporter ID"),
        ("export_id" = i64, Path, description = "Export ID")
    ),
    responses(
        (status = 204, description = "Export deleted"),
        (status = 404, description = "Export not found"),
        (status = 500, description = "Export is the exporter's last_export (code: conflict)", body = crate::error::ApiError)
    )
)]
pub async fn delete_export(
    State(state): State<AppState>,
    Path((id, export_id)): Path<(i64, i64)>,
) -> Response {
    match state
        .depot
        .delete_export(ExporterId(id), ExportId(export_id))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!(exporter_id = id, export_id, error = %e, "Failed to delete export");
            e.into_response()
        }
    }
}
