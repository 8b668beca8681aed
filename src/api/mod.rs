//! REST API server module
//!
//! Provides an OpenAPI 3 documented REST API over the depot: task status,
//! repositories and sync, exporters and exports, and an event stream.

use crate::{Config, Depot, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Tasks
/// - `GET /tasks` - List tasks (optional `?state=`)
/// - `GET /tasks/:id` - Task status
/// - `POST /tasks/:id/cancel` - Request cancellation
///
/// ## Repositories
/// - `GET /repositories` - List repositories
/// - `POST /repositories` - Create repository (idempotent)
/// - `GET /repositories/:name` - Get repository
/// - `GET /repositories/:name/versions` - List versions
/// - `POST /repositories/:name/sync` - Schedule a sync
///
/// ## Exporters
/// - `GET /exporters` - List exporters
/// - `POST /exporters` - Create exporter
/// - `GET /exporters/:id` - Get exporter
/// - `PATCH /exporters/:id` - Update path / last_export
/// - `DELETE /exporters/:id` - Delete exporter
///
/// ## Exports
/// - `GET /exporters/:id/exports` - List exports
/// - `POST /exporters/:id/exports` - Schedule an export
/// - `GET /exporters/:id/exports/:export_id` - Get export
/// - `DELETE /exporters/:id/exports/:export_id` - Delete export
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
///
/// Paths are relative; [`start_api_server`] mounts them under `/api/v1`.
/// - `GET /events` - Server-sent events stream
pub fn create_router(depot: Arc<Depot>, config: Arc<Config>) -> Router {
    let state = AppState::new(depot, config.clone());

    let router = Router::new()
        // Tasks
        .route("/tasks", get(routes::list_tasks))
        .route("/tasks/:id", get(routes::get_task))
        .route("/tasks/:id/cancel", post(routes::cancel_task))
        // Repositories
        .route(
            "/repositories",
            get(routes::list_repositories).post(routes::create_repository),
        )
        .route("/repositories/:name", get(routes::get_repository))
        .route(
            "/repositories/:name/versions",
            get(routes::list_repository_versions),
        )
        .route("/repositories/:name/sync", post(routes::sync_repository))
        // Exporters
        .route(
            "/exporters",
            get(routes::list_exporters).post(routes::create_exporter),
        )
        .route(
            "/exporters/:id",
            get(routes::get_exporter)
                .patch(routes::update_exporter)
                .delete(routes::delete_exporter),
        )
        // Exports
        .route(
            "/exporters/:id/exports",
            get(routes::list_exports).post(routes::create_export),
        )
        .route(
            "/exporters/:id/exports/:export_id",
            get(routes::get_export).delete(routes::delete_export),
        )
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // Swagger UI reuses the /openapi.json document
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer for the configured origins ("*" or empty allows any)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// The router is mounted under `/api/v1`. Runs until the server stops.
///
/// # Example
///
/// ```no_run
/// use content_depot::{Config, Depot};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let depot = Arc::new(Depot::new((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// content_depot::api::start_api_server(depot, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(depot: Arc<Depot>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = Router::new()
        .nest("/api/v1", create_router(depot, config))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
