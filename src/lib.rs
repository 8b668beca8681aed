//! # content-depot
//!
//! Repositories synced from remote content feeds into immutable versions, and
//! exporters that snapshot sets of repositories into checksummed artifacts.
//! Every long-running operation is a tracked task with a pollable status.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - The [`Depot`] facade is the whole API; the REST
//!   server in [`api`] is a thin layer over it
//! - **Tracked work** - Syncs and exports return a task immediately; callers
//!   poll it (see [`monitor::await_all`]) or subscribe to events
//! - **Serialized per resource** - Tasks touching the same repository or
//!   exporter run one at a time, in submission order
//!
//! ## Quick Start
//!
//! ```no_run
//! use content_depot::{Config, Depot, NewRemote, NewRepository};
//! use content_depot::monitor::{PollOptions, await_all};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let depot = Depot::new(Config::default()).await?;
//!
//!     depot
//!         .create_repository(NewRepository::named("zoo").with_remote(NewRemote {
//!             url: "https://feeds.example.com/zoo/manifest.csv".to_string(),
//!             ca_cert: None,
//!             client_cert: None,
//!         }))
//!         .await?;
//!
//!     if let Some(task) = depot.sync("zoo").await? {
//!         let outcomes = await_all(&depot, &[task.id], &PollOptions::default()).await;
//!         println!("{:?}", outcomes);
//!     }
//!
//!     depot.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// The depot facade (decomposed into focused submodules)
pub mod depot;
/// Error types
pub mod error;
/// Export engine
pub mod export;
/// Completion polling for submitted tasks
pub mod monitor;
/// Retry logic with exponential backoff
pub mod retry;
/// Content-addressed blob storage
pub mod storage;
/// Sync engine and remote feeds
pub mod sync;
/// Task records, scheduling, and execution
pub mod tasking;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use depot::Depot;
pub use error::{
    ApiError, ConflictError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus,
};
pub use monitor::{PollOptions, TaskLookup, TaskOutcome, await_all};
pub use sync::{HttpFeed, RemoteFeed};
pub use tasking::{TaskContext, TaskScheduler, TaskWork};
pub use types::{
    CreatedResource, Event, ExportId, ExportInfo, ExportedResource, ExporterId, ExporterInfo,
    ExporterUpdate, NewExporter, NewRemote, NewRepository, RepositoryInfo,
    RepositoryVersionInfo, ResourceKey, SyncOptions, TaskError, TaskId, TaskInfo, TaskKind,
    TaskState,
};

/// Helper function to run the depot with graceful signal handling.
///
/// Waits for a termination signal and then calls [`Depot::shutdown`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use content_depot::{Config, Depot, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let depot = Depot::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(depot).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(depot: Depot) -> Result<()> {
    wait_for_signal().await;
    depot.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
