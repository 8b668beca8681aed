//! Sync task: pull a repository's remote feeds into a new version.

use crate::db::{ContentUnit, Database};
use crate::error::{Error, Result};
use crate::storage::{ContentStore, sha256_hex};
use crate::tasking::{TaskContext, TaskWork};
use crate::types::{CreatedResource, Event, ResourceKey, SyncOptions, TaskKind};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::feed::{FeedSource, RemoteFeed};
use super::manifest::{ManifestEntry, parse_manifest};

/// A unit to include in the new version and the feed it comes from
struct RemoteUnit {
    entry: ManifestEntry,
    source: usize,
}

/// Work that syncs one repository from all of its remotes
///
/// The new version is committed in a single transaction after every missing
/// unit has been downloaded and verified, so a failed or canceled sync leaves
/// the repository at its previous version.
pub struct SyncWork {
    db: Arc<Database>,
    store: ContentStore,
    feed: Arc<dyn RemoteFeed>,
    event_tx: broadcast::Sender<Event>,
    repository: String,
    options: SyncOptions,
}

impl SyncWork {
    /// Prepare a sync of `repository`
    pub fn new(
        db: Arc<Database>,
        store: ContentStore,
        feed: Arc<dyn RemoteFeed>,
        event_tx: broadcast::Sender<Event>,
        repository: impl Into<String>,
        options: SyncOptions,
    ) -> Self {
        Self {
            db,
            store,
            feed,
            event_tx,
            repository: repository.into(),
            options,
        }
    }

    /// Fetch and merge every remote manifest; earlier remotes win on conflicts
    async fn collect_remote_units(
        &self,
        ctx: &TaskContext,
        sources: &[FeedSource],
    ) -> Result<BTreeMap<String, RemoteUnit>> {
        let mut units: BTreeMap<String, RemoteUnit> = BTreeMap::new();

        for (index, source) in sources.iter().enumerate() {
            ctx.checkpoint()?;
            let body = self.feed.fetch(source, &source.url).await?;
            let text = String::from_utf8(body)
                .map_err(|_| Error::Feed(format!("manifest at {} is not UTF-8", source.url)))?;
            let entries = parse_manifest(&text)?;
            tracing::debug!(
                repository = %self.repository,
                url = %source.url,
                units = entries.len(),
                "fetched manifest"
            );

            for entry in entries {
                match units.get(&entry.relative_path) {
                    Some(existing) if existing.entry.sha256 != entry.sha256 => {
                        tracing::warn!(
                            repository = %self.repository,
                            relative_path = %entry.relative_path,
                            url = %source.url,
                            "unit differs between remotes, keeping the earlier remote's copy"
                        );
                    }
                    Some(_) => {}
                    None => {
                        units.insert(
                            entry.relative_path.clone(),
                            RemoteUnit {
                                entry,
                                source: index,
                            },
                        );
                    }
                }
            }
        }

        Ok(units)
    }

    /// Download, verify and store one unit unless its blob is already present
    async fn fetch_unit(&self, source: &FeedSource, entry: &ManifestEntry) -> Result<bool> {
        if self.store.contains(&entry.sha256).await {
            return Ok(false);
        }

        let url = source.unit_url(&entry.relative_path)?;
        let bytes = self.feed.fetch(source, &url).await?;

        if bytes.len() as u64 != entry.size {
            return Err(Error::Feed(format!(
                "{}: expected {} bytes, received {}",
                entry.relative_path,
                entry.size,
                bytes.len()
            )));
        }
        let actual = sha256_hex(&bytes);
        if actual != entry.sha256 {
            return Err(Error::Checksum {
                relative_path: entry.relative_path.clone(),
                expected: entry.sha256.clone(),
                actual,
            });
        }

        self.store.put(&bytes).await?;
        Ok(true)
    }
}

#[async_trait]
impl TaskWork for SyncWork {
    fn kind(&self) -> TaskKind {
        TaskKind::Sync
    }

    fn name(&self) -> String {
        format!("sync repository '{}'", self.repository)
    }

    fn resource_key(&self) -> ResourceKey {
        ResourceKey::repository(&self.repository)
    }

    async fn run(&self, ctx: &TaskContext) -> Result<Vec<CreatedResource>> {
        let repository = self
            .db
            .get_repository(&self.repository)
            .await?
            .ok_or_else(|| Error::NotFound(format!("repository '{}'", self.repository)))?;
        let remotes = self.db.list_remotes(&self.repository).await?;
        if remotes.is_empty() {
            return Err(Error::Feed(format!(
                "repository '{}' has no remotes",
                self.repository
            )));
        }
        let sources = remotes
            .iter()
            .map(FeedSource::from_remote)
            .collect::<Result<Vec<_>>>()?;

        let base_version = repository.latest_version;
        let current = self.db.version_content(&self.repository, base_version).await?;
        let remote_units = self.collect_remote_units(ctx, &sources).await?;

        // Additive sync keeps local units the feeds no longer list
        let mut target: BTreeMap<String, ContentUnit> = if self.options.mirror {
            BTreeMap::new()
        } else {
            current
                .iter()
                .map(|unit| (unit.relative_path.clone(), unit.clone()))
                .collect()
        };
        for (path, remote) in &remote_units {
            target.insert(
                path.clone(),
                ContentUnit {
                    relative_path: path.clone(),
                    sha256: remote.entry.sha256.clone(),
                    size: remote.entry.size as i64,
                },
            );
        }

        let current_set: BTreeSet<&ContentUnit> = current.iter().collect();
        let target_set: BTreeSet<&ContentUnit> = target.values().collect();
        if current_set == target_set {
            tracing::info!(
                repository = %self.repository,
                version = base_version,
                "repository already up to date"
            );
            return Ok(vec![]);
        }

        let mut downloaded = 0usize;
        for remote in remote_units.values() {
            ctx.checkpoint()?;
            if self.fetch_unit(&sources[remote.source], &remote.entry).await? {
                downloaded += 1;
            }
        }

        ctx.checkpoint()?;
        let units: Vec<ContentUnit> = target.into_values().collect();
        let number = self
            .db
            .create_repository_version(&self.repository, base_version, Some(ctx.id), &units)
            .await?;

        tracing::info!(
            repository = %self.repository,
            version = number,
            units = units.len(),
            downloaded,
            mirror = self.options.mirror,
            "created repository version"
        );
        self.event_tx
            .send(Event::RepositoryVersionCreated {
                repository: self.repository.clone(),
                number,
            })
            .ok();

        Ok(vec![CreatedResource::RepositoryVersion {
            repository: self.repository.clone(),
            number,
        }])
    }
}
