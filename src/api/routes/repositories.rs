//! Repository handlers.

use super::SyncResponse;
use crate::api::AppState;
use crate::types::{NewRepository, SyncOptions};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /repositories - List repositories
#[utoipa::path(
    get,
    path = "/api/v1/repositories",
    tag = "repositories",
    responses(
        (status = 200, description = "All repositories", body = Vec<crate::types::RepositoryInfo>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_repositories(State(state): State<AppState>) -> Response {
    match state.depot.list_repositories().await {
        Ok(repositories) => (StatusCode::OK, Json(repositories)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list repositories");
            e.into_response()
        }
    }
}

/// POST /repositories - Create a repository (idempotent by name)
#[utoipa::path(
    post,
    path = "/api/v1/repositories",
    tag = "repositories",
    request_body = NewRepository,
    responses(
        (status = 200, description = "Repository created or already present", body = crate::types::RepositoryInfo),
        (status = 400, description = "Invalid name or remote"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_repository(
    State(state): State<AppState>,
    Json(request): Json<NewRepository>,
) -> Response {
    match state.depot.create_repository(request).await {
        Ok(repository) => (StatusCode::OK, Json(repository)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /repositories/:name - Get a repository
#[utoipa::path(
    get,
    path = "/api/v1/repositories/{name}",
    tag = "repositories",
    params(
        ("name" = String, Path, description = "Repository name")
    ),
    responses(
        (status = 200, description = "Repository", body = crate::types::RepositoryInfo),
        (status = 404, description = "Repository not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_repository(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.depot.get_repository(&name).await {
        Ok(repository) => (StatusCode::OK, Json(repository)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /repositories/:name/versions - List versions of a repository
#[utoipa::path(
    get,
    path = "/api/v1/repositories/{name}/versions",
    tag = "repositories",
    params(
        ("name" = String, Path, description = "Repository name")
    ),
    responses(
        (status = 200, description = "Versions, oldest first", body = Vec<crate::types::RepositoryVersionInfo>),
        (status = 404, description = "Repository not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_repository_versions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    match state.depot.list_repository_versions(&name).await {
        Ok(versions) => (StatusCode::OK, Json(versions)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /repositories/:name/sync - Schedule a sync
///
/// The body is optional; without one an additive sync is scheduled.
#[utoipa::path(
    post,
    path = "/api/v1/repositories/{name}/sync",
    tag = "repositories",
    params(
        ("name" = String, Path, description = "Repository name")
    ),
    request_body(content = SyncOptions, description = "Optional sync options"),
    responses(
        (status = 202, description = "Sync scheduled", body = SyncResponse),
        (status = 200, description = "Sync not scheduled (no remotes or already active)", body = SyncResponse),
        (status = 404, description = "Repository not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn sync_repository(
    State(state): State<AppState>,
    Path(name): Path<String>,
    options: Option<Json<SyncOptions>>,
) -> Response {
    if let Err(e) = state.depot.get_repository(&name).await {
        return e.into_response();
    }

    let options = options.map(|Json(options)| options).unwrap_or_default();
    match state.depot.sync_with_options(&name, options).await {
        Ok(Some(task)) => (
            StatusCode::ACCEPTED,
            Json(SyncResponse {
                scheduled: true,
                task: Some(task),
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(SyncResponse {
                scheduled: false,
                task: None,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(repository = %name, error = %e, "Failed to schedule sync");
            e.into_response()
        }
    }
}
