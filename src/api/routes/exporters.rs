//! Exporter management handlers.

use crate::api::AppState;
use crate::types::{ExporterId, ExporterUpdate, NewExporter};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /exporters - List exporters
#[utoipa::path(
    get,
    path = "/api/v1/exporters",
    tag = "exporters",
    responses(
        (status = 200, description = "All exporters", body = Vec<crate::types::ExporterInfo>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_exporters(State(state): State<AppState>) -> Response {
    match state.depot.list_exporters().await {
        Ok(exporters) => (StatusCode::OK, Json(exporters)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list exporters");
            e.into_response()
        }
    }
}

/// POST /exporters - Create an exporter
#[utoipa::path(
    post,
    path = "/api/v1/exporters",
    tag = "exporters",
    request_body = NewExporter,
    responses(
        (status = 201, description = "Exporter created", body = crate::types::ExporterInfo),
        (status = 400, description = "Invalid name, repositories, or path"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_exporter(
    State(state): State<AppState>,
    Json(request): Json<NewExporter>,
) -> Response {
    match state.depot.create_exporter(request).await {
        Ok(exporter) => (StatusCode::CREATED, Json(exporter)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /exporters/:id - Get an exporter
#[utoipa::path(
    get,
    path = "/api/v1/exporters/{id}",
    tag = "exporters",
    params(
        ("id" = i64, Path, description = "Exporter ID")
    ),
    responses(
        (status = 200, description = "Exporter", body = crate::types::ExporterInfo),
        (status = 404, description = "Exporter not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_exporter(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.depot.get_exporter(ExporterId(id)).await {
        Ok(exporter) => (StatusCode::OK, Json(exporter)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PATCH /exporters/:id - Update path and/or last_export
///
/// `"last_export": null` clears the pointer; an absent field leaves it alone.
#[utoipa::path(
    patch,
    path = "/api/v1/exporters/{id}",
    tag = "exporters",
    params(
        ("id" = i64, Path, description = "Exporter ID")
    ),
    request_body = ExporterUpdate,
    responses(
        (status = 200, description = "Updated exporter", body = crate::types::ExporterInfo),
        (status = 400, description = "Invalid path or last_export"),
        (status = 404, description = "Exporter not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_exporter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ExporterUpdate>,
) -> Response {
    match state.depot.update_exporter(ExporterId(id), update).await {
        Ok(exporter) => (StatusCode::OK, Json(exporter)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /exporters/:id - Delete an exporter
#[utoipa::path(
    delete,
    path = "/api/v1/exporters/{id}",
    tag = "exporters",
    params(
        ("id" = i64, Path, description = "Exporter ID")
    ),
    responses(
        (status = 204, description = "Exporter deleted"),
        (status = 404, description = "Exporter not found"),
        (status = 500, description = "Exporter still has a last_export (code: conflict)", body = crate::error::ApiError)
    )
)]
pub async fn delete_exporter(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.depot.delete_exporter(ExporterId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!(exporter_id = id, error = %e, "Failed to delete exporter");
            e.into_response()
        }
    }
}
