//! Task status and cancellation handlers.

use super::ListTasksQuery;
use crate::api::AppState;
use crate::types::TaskId;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /tasks - List tasks
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    tag = "tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "Tasks in submission order", body = Vec<crate::types::TaskInfo>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Response {
    match state.depot.list_tasks(query.state).await {
        Ok(tasks) => (StatusCode::OK, Json(tasks)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list tasks");
            e.into_response()
        }
    }
}

/// GET /tasks/:id - Get task status
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task status", body = crate::types::TaskInfo),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_task(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.depot.get_task(TaskId(id)).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /tasks/:id/cancel - Request cancellation
///
/// Waiting tasks are canceled at once; running tasks stop at their next
/// checkpoint. Canceling a finished task returns it unchanged.
#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/cancel",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task ID")
    ),
    responses(
        (status = 202, description = "Cancellation requested; current task status", body = crate::types::TaskInfo),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn cancel_task(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.depot.cancel_task(TaskId(id)).await {
        Ok(task) => (StatusCode::ACCEPTED, Json(task)).into_response(),
        Err(e) => {
            tracing::warn!(task_id = id, error = %e, "Failed to cancel task");
            e.into_response()
        }
    }
}
