//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the content-depot REST API using
//! utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the content-depot REST API
///
/// The document can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/api/v1/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "content-depot REST API",
        version = "0.1.0",
        description = "Repositories synced from remote feeds, and exporters that snapshot them into checksummed artifacts",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:24817/api/v1", description = "Local development server")
    ),
    paths(
        // Tasks
        crate::api::routes::list_tasks,
        crate::api::routes::get_task,
        crate::api::routes::cancel_task,

        // Repositories
        crate::api::routes::list_repositories,
        crate::api::routes::create_repository,
        crate::api::routes::get_repository,
        crate::api::routes::list_repository_versions,
        crate::api::routes::sync_repository,

        // Exporters
        crate::api::routes::list_exporters,
        crate::api::routes::create_exporter,
        crate::api::routes::get_exporter,
        crate::api::routes::update_exporter,
        crate::api::routes::delete_exporter,

        // Exports
        crate::api::routes::list_exports,
        crate::api::routes::create_export,
        crate::api::routes::get_export,
        crate::api::routes::delete_export,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::TaskId,
        crate::types::ExporterId,
        crate::types::ExportId,
        crate::types::TaskState,
        crate::types::TaskKind,
        crate::types::ResourceKey,
        crate::types::CreatedResource,
        crate::types::TaskError,
        crate::types::TaskInfo,
        crate::types::NewRemote,
        crate::types::NewRepository,
        crate::types::RemoteInfo,
        crate::types::RepositoryInfo,
        crate::types::RepositoryVersionInfo,
        crate::types::SyncOptions,
        crate::types::NewExporter,
        crate::types::ExporterUpdate,
        crate::types::ExporterInfo,
        crate::types::ExportedResource,
        crate::types::ExportInfo,
        crate::types::Event,

        crate::api::routes::ListTasksQuery,
        crate::api::routes::SyncResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "tasks", description = "Tasks - Status and cancellation of sync and export tasks"),
        (name = "repositories", description = "Repositories - Create repositories, list versions, schedule syncs"),
        (name = "exporters", description = "Exporters - Export targets over a fixed set of repositories"),
        (name = "exports", description = "Exports - Schedule, list, and delete export artifacts"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();

        for path in [
            "/api/v1/tasks",
            "/api/v1/tasks/{id}",
            "/api/v1/tasks/{id}/cancel",
            "/api/v1/repositories",
            "/api/v1/repositories/{name}",
            "/api/v1/repositories/{name}/versions",
            "/api/v1/repositories/{name}/sync",
            "/api/v1/exporters",
            "/api/v1/exporters/{id}",
            "/api/v1/exporters/{id}/exports",
            "/api/v1/exporters/{id}/exports/{export_id}",
            "/api/v1/health",
            "/api/v1/openapi.json",
            "/api/v1/events",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn spec_has_schemas_and_tags() {
        let spec = ApiDoc::openapi();

        let components = spec.components.unwrap();
        assert!(components.schemas.contains_key("TaskInfo"));
        assert!(components.schemas.contains_key("ApiError"));

        let tags = spec.tags.unwrap();
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert!(tag_names.contains(&"tasks"));
        assert!(tag_names.contains(&"exporters"));
    }

    #[test]
    fn spec_serializes_as_openapi_3() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let version = json.get("openapi").and_then(|v| v.as_str()).unwrap();
        assert!(version.starts_with("3."));
        assert_eq!(json["info"]["title"], "content-depot REST API");
    }
}
