//! REST API server example
//!
//! Runs a depot with the REST API enabled, allowing control via HTTP.
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:24817/api/v1/swagger-ui
//! - Create repositories via POST http://localhost:24817/api/v1/repositories
//! - Poll tasks via GET http://localhost:24817/api/v1/tasks/{id}
//! - Stream events via GET http://localhost:24817/api/v1/events

use content_depot::config::{ApiConfig, Config, ExportConfig, StorageConfig};
use content_depot::{Depot, run_with_shutdown};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_depot=info,tower_http=debug".into()),
        )
        .init();

    let export_root = std::env::current_dir()?.join("exports");
    std::fs::create_dir_all(&export_root)?;

    let config = Config {
        storage: StorageConfig {
            database_path: "depot.db".into(),
            content_dir: "content".into(),
        },
        export: ExportConfig {
            allowed_export_paths: vec![export_root.clone()],
        },
        api: ApiConfig {
            bind_address: "127.0.0.1:24817".parse::<SocketAddr>()?,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
            swagger_ui: true,
        },
        ..Default::default()
    };

    let depot = Arc::new(Depot::new(config).await?);
    let server = depot.spawn_api_server();

    println!("content-depot REST API server");
    println!("Swagger UI:    http://localhost:24817/api/v1/swagger-ui");
    println!("API base:      http://localhost:24817/api/v1");
    println!("Events stream: http://localhost:24817/api/v1/events");
    println!();
    println!("Example commands:");
    println!("  # Create a repository with one remote feed");
    println!("  curl -X POST http://localhost:24817/api/v1/repositories \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!(
        "    -d '{{\"name\": \"zoo\", \"remotes\": [{{\"url\": \"https://feeds.example.com/zoo/manifest.csv\"}}]}}'"
    );
    println!();
    println!("  # Sync it and watch the task");
    println!("  curl -X POST http://localhost:24817/api/v1/repositories/zoo/sync");
    println!("  curl http://localhost:24817/api/v1/tasks");
    println!();
    println!("  # Export it (paths must be inside {})", export_root.display());
    println!("  curl -X POST http://localhost:24817/api/v1/exporters \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!(
        "    -d '{{\"name\": \"nightly\", \"repositories\": [\"zoo\"], \"path\": \"{}\"}}'",
        export_root.join("nightly").display()
    );
    println!("  curl -X POST http://localhost:24817/api/v1/exporters/1/exports");
    println!();
    println!("Press Ctrl+C to stop");

    run_with_shutdown((*depot).clone()).await?;
    server.abort();

    Ok(())
}
