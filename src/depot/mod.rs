//! The [`Depot`] facade split into focused submodules.
//!
//! - [`repositories`] - Idempotent repository creation, versions, and sync submission
//! - [`exporters`] - Exporter CRUD with `last_export` protection
//! - [`exports`] - Export submission, listing, and protected deletion
//! - [`tasks`] - Task lookup and cancellation
//! - [`lifecycle`] - Graceful shutdown

mod exporters;
mod exports;
mod lifecycle;
mod repositories;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::storage::ContentStore;
use crate::sync::{HttpFeed, RemoteFeed};
use crate::tasking::TaskScheduler;
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Main depot instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Depot {
    /// Database instance for persistence
    /// Public for integration tests to inspect records directly
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Blob store shared by sync and export
    pub(crate) store: ContentStore,
    /// Fetch primitive used by sync tasks
    pub(crate) feed: Arc<dyn RemoteFeed>,
    /// Scheduler executing sync and export tasks
    pub(crate) scheduler: TaskScheduler,
}

impl Depot {
    /// Create a depot that fetches remote feeds over HTTP(S)
    ///
    /// This initializes all core components:
    /// - Opens/creates the SQLite database and runs migrations
    /// - Opens the content store
    /// - Fails tasks orphaned by a previous process
    /// - Starts the task dispatcher
    pub async fn new(config: Config) -> Result<Self> {
        let feed = Arc::new(HttpFeed::new(config.sync.clone()));
        Self::with_feed(config, feed).await
    }

    /// Create a depot with a custom feed implementation
    pub async fn with_feed(config: Config, feed: Arc<dyn RemoteFeed>) -> Result<Self> {
        config.validate()?;

        let store = ContentStore::open(&config.storage.content_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to open content store '{}': {}",
                    config.storage.content_dir.display(),
                    e
                )))
            })?;

        let db = Arc::new(Database::new(&config.storage.database_path).await?);

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let scheduler = TaskScheduler::new(db.clone(), event_tx.clone(), config.tasks.clone());
        scheduler.recover_orphaned_tasks().await?;

        // Mark that we're starting up (for unclean shutdown detection)
        db.set_clean_start().await?;

        scheduler.start_dispatcher();
        tracing::info!(
            database = %config.storage.database_path.display(),
            content_dir = %config.storage.content_dir.display(),
            max_concurrent_tasks = config.tasks.max_concurrent_tasks,
            "depot started"
        );

        Ok(Self {
            db,
            event_tx,
            config: Arc::new(config),
            store,
            feed,
            scheduler,
        })
    }

    /// Subscribe to task and resource events
    ///
    /// Each subscriber receives every event. A subscriber that falls more than
    /// 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Content store backing repository versions
    pub fn content_store(&self) -> &ContentStore {
        &self.store
    }

    /// Emit an event to all subscribers (dropped if nobody listens)
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let depot = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(depot, config).await })
    }
}
