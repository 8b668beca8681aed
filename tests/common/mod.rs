//! Common test utilities for content-depot integration tests

#![allow(dead_code)]

use content_depot::config::Config;
use content_depot::{Depot, NewRemote, NewRepository};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Hex sha256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// HTTP server publishing repository feeds at `/<repo>/manifest.csv`
pub struct FeedServer {
    pub server: MockServer,
    /// Mock priority for the next publication; newer publications win
    next_priority: AtomicU8,
}

impl FeedServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            next_priority: AtomicU8::new(200),
        }
    }

    /// Manifest URL of `repo`
    pub fn manifest_url(&self, repo: &str) -> String {
        format!("{}/{}/manifest.csv", self.server.uri(), repo)
    }

    /// Serve `files` under `/<repo>/`, shadowing any earlier publication
    pub async fn publish(&self, repo: &str, files: &[(&str, &str)]) {
        let priority = self.next_priority.fetch_sub(1, Ordering::SeqCst);
        let mut manifest = String::from("# relative_path,sha256,size\n");
        for (name, content) in files {
            manifest.push_str(&format!(
                "{},{},{}\n",
                name,
                sha256_hex(content.as_bytes()),
                content.len()
            ));
            Mock::given(method("GET"))
                .and(path(format!("/{}/{}", repo, name)))
                .respond_with(ResponseTemplate::new(200).set_body_string(*content))
                .with_priority(priority)
                .mount(&self.server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(format!("/{}/manifest.csv", repo)))
            .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
            .with_priority(priority)
            .mount(&self.server)
            .await;
    }
}

/// Depot config rooted at `root` with `root/exports` as the export root
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.database_path = root.join("depot.db");
    config.storage.content_dir = root.join("content");
    config.export.allowed_export_paths = vec![root.join("exports")];
    config.tasks.dispatch_interval = Duration::from_millis(20);
    config.sync.request_timeout = Duration::from_secs(5);
    config.sync.retry.max_attempts = 1;
    config
}

/// Create a repository pointing at `feeds`
pub async fn create_repository(depot: &Depot, feeds: &FeedServer, name: &str) {
    depot
        .create_repository(NewRepository::named(name).with_remote(NewRemote {
            url: feeds.manifest_url(name),
            ca_cert: None,
            client_cert: None,
        }))
        .await
        .unwrap();
}
