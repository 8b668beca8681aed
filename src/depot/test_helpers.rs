//! Shared test helpers for creating Depot instances in tests.

use crate::config::Config;
use crate::depot::Depot;
use crate::error::{Error, Result};
use crate::storage::sha256_hex;
use crate::sync::{FeedSource, RemoteFeed};
use crate::types::{NewRemote, NewRepository, TaskId, TaskInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use url::Url;

/// Remote feed served from memory, keyed by full URL
#[derive(Default)]
pub(crate) struct MemoryFeed {
    bodies: std::sync::Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MemoryFeed {
    pub(crate) fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.bodies.lock().unwrap().insert(url.to_string(), body.into());
    }

    /// Publish a manifest listing `files` and serve each file next to it
    pub(crate) fn publish(&self, base: &str, files: &[(&str, &str)]) {
        let mut manifest = String::new();
        for (path, content) in files {
            manifest.push_str(&format!(
                "{},{},{}\n",
                path,
                sha256_hex(content.as_bytes()),
                content.len()
            ));
            self.serve(&format!("{}/{}", base, path), content.as_bytes());
        }
        self.serve(&format!("{}/manifest.csv", base), manifest);
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFeed for MemoryFeed {
    async fn fetch(&self, _source: &FeedSource, url: &Url) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Error::Feed(format!("404 {}", url)))
    }
}

/// Base URL of the feed for repository `name`
pub(crate) fn feed_url(name: &str) -> String {
    format!("https://feeds.example/{}", name)
}

/// Depot backed by a temp dir and an in-memory feed.
/// The tempdir must be kept alive for the duration of the test.
pub(crate) struct TestDepot {
    pub depot: Depot,
    pub feed: Arc<MemoryFeed>,
    pub temp_dir: TempDir,
}

impl TestDepot {
    /// Directory exporters may write below
    pub(crate) fn export_root(&self) -> PathBuf {
        self.temp_dir.path().join("exports")
    }

    /// Create a repository with one in-memory remote publishing `files`
    pub(crate) async fn repository_with(&self, name: &str, files: &[(&str, &str)]) {
        let base = feed_url(name);
        self.feed.publish(&base, files);
        self.depot
            .create_repository(NewRepository::named(name).with_remote(NewRemote {
                url: format!("{}/manifest.csv", base),
                ca_cert: None,
                client_cert: None,
            }))
            .await
            .unwrap();
    }

    /// Poll a task until it is terminal
    pub(crate) async fn wait_for_task(&self, id: TaskId) -> TaskInfo {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let task = self.depot.get_task(id).await.unwrap();
            if task.state.is_terminal() {
                return task;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "task {} stuck in {}",
                id,
                task.state
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Sync a repository and wait for the task to finish
    pub(crate) async fn sync_and_wait(&self, name: &str) -> TaskInfo {
        let task = self.depot.sync(name).await.unwrap().expect("sync accepted");
        self.wait_for_task(task.id).await
    }
}

/// Test config rooted at `root`, with `root/exports` as the only export root
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.database_path = root.join("test.db");
    config.storage.content_dir = root.join("content");
    config.export.allowed_export_paths = vec![root.join("exports")];
    config.tasks.max_concurrent_tasks = 3;
    config.tasks.dispatch_interval = Duration::from_millis(10);
    config.tasks.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Helper to create a test Depot with a persistent database and memory feed.
pub(crate) async fn create_test_depot() -> TestDepot {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    std::fs::create_dir_all(temp_dir.path().join("exports")).unwrap();

    let feed = Arc::new(MemoryFeed::default());
    let depot = Depot::with_feed(config, feed.clone()).await.unwrap();

    TestDepot {
        depot,
        feed,
        temp_dir,
    }
}
