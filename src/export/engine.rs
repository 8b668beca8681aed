//! Export task: snapshot an exporter's repositories into a zip artifact.

use crate::db::{Database, NewExport};
use crate::error::{Error, Result};
use crate::storage::ContentStore;
use crate::tasking::{TaskContext, TaskWork};
use crate::types::{
    CreatedResource, Event, ExportedResource, ExporterId, ResourceKey, TaskKind,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::artifact::{
    ArtifactEntry, ExportMetadata, RepositorySnapshot, SnapshotUnit, write_artifact,
};

/// Work that produces one export of an exporter
///
/// Runs under the exporter's resource key, so exports of one exporter never
/// overlap and `last_export` moves in submission order.
pub struct ExportWork {
    db: Arc<Database>,
    store: ContentStore,
    event_tx: broadcast::Sender<Event>,
    exporter_id: ExporterId,
}

impl ExportWork {
    /// Prepare an export of `exporter_id`
    pub fn new(
        db: Arc<Database>,
        store: ContentStore,
        event_tx: broadcast::Sender<Event>,
        exporter_id: ExporterId,
    ) -> Self {
        Self {
            db,
            store,
            event_tx,
            exporter_id,
        }
    }

    /// Capture every exporter repository at its latest version
    async fn snapshot(&self, repositories: &[String]) -> Result<Vec<RepositorySnapshot>> {
        let mut snapshots = Vec::with_capacity(repositories.len());
        for name in repositories {
            let repository = self
                .db
                .get_repository(name)
                .await?
                .ok_or_else(|| Error::NotFound(format!("repository '{}'", name)))?;
            let units = self
                .db
                .version_content(name, repository.latest_version)
                .await?
                .into_iter()
                .map(|unit| SnapshotUnit {
                    relative_path: unit.relative_path,
                    sha256: unit.sha256,
                    size: unit.size,
                })
                .collect();

            snapshots.push(RepositorySnapshot {
                repository: name.clone(),
                version: repository.latest_version,
                units,
            });
        }
        Ok(snapshots)
    }
}

fn artifact_name(ctx: &TaskContext) -> String {
    format!(
        "export-{}-{}.zip",
        chrono::Utc::now().format("%Y%m%dT%H%M%S"),
        ctx.id
    )
}

async fn remove_artifact(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = ?path, error = %e, "failed to remove abandoned artifact");
    }
}

#[async_trait]
impl TaskWork for ExportWork {
    fn kind(&self) -> TaskKind {
        TaskKind::Export
    }

    fn name(&self) -> String {
        format!("export exporter {}", self.exporter_id)
    }

    fn resource_key(&self) -> ResourceKey {
        ResourceKey::exporter(self.exporter_id)
    }

    async fn run(&self, ctx: &TaskContext) -> Result<Vec<CreatedResource>> {
        let exporter = self
            .db
            .get_exporter(self.exporter_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("exporter {}", self.exporter_id)))?;
        let repositories = self.db.exporter_repositories(self.exporter_id).await?;

        let snapshots = self.snapshot(&repositories).await?;
        ctx.checkpoint()?;

        let entries: Vec<ArtifactEntry> = snapshots
            .iter()
            .flat_map(|snapshot| {
                snapshot.units.iter().map(move |unit| {
                    ArtifactEntry::unit(
                        &snapshot.repository,
                        &unit.relative_path,
                        self.store.blob_path(&unit.sha256),
                    )
                })
            })
            .collect();
        let resources: Vec<ExportedResource> = snapshots
            .iter()
            .map(|s| ExportedResource {
                repository: s.repository.clone(),
                version: s.version,
            })
            .collect();

        let directory = PathBuf::from(&exporter.path);
        tokio::fs::create_dir_all(&directory).await?;
        let target = directory.join(artifact_name(ctx));

        let metadata = ExportMetadata {
            exporter_id: self.exporter_id,
            exporter: exporter.name.clone(),
            task_id: ctx.id,
            created_at: chrono::Utc::now().to_rfc3339(),
            repositories: snapshots,
        };
        debug!(
            exporter_id = %self.exporter_id,
            target = ?target,
            entries = entries.len(),
            "writing export artifact"
        );

        let sha256 = {
            let target = target.clone();
            let token = ctx.token();
            tokio::task::spawn_blocking(move || {
                write_artifact(&target, &metadata, &entries, &token)
            })
            .await
            .map_err(|e| Error::Other(format!("artifact writer panicked: {}", e)))??
        };

        if let Err(e) = ctx.checkpoint() {
            remove_artifact(&target).await;
            return Err(e);
        }

        let filename = target.to_string_lossy().into_owned();
        let recorded = self
            .db
            .record_export(&NewExport {
                exporter_id: self.exporter_id,
                task_id: Some(ctx.id),
                filename: &filename,
                sha256: &sha256,
                resources: &resources,
            })
            .await;
        let export_id = match recorded {
            Ok(id) => id,
            Err(e) => {
                remove_artifact(&target).await;
                return Err(e);
            }
        };

        info!(
            exporter_id = %self.exporter_id,
            export_id = %export_id,
            sha256 = %sha256,
            filename = %filename,
            "export recorded"
        );
        self.event_tx
            .send(Event::ExportCreated {
                exporter_id: self.exporter_id,
                export_id,
            })
            .ok();

        Ok(vec![CreatedResource::Export {
            exporter_id: self.exporter_id,
            export_id,
        }])
    }
}
