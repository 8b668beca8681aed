//! Exporter management.

use crate::db::GuardedDelete;
use crate::error::{ConflictError, Error, Result};
use crate::export::validate_export_path;
use crate::types::{
    ExportId, ExporterId, ExporterInfo, ExporterUpdate, NewExporter, ResourceKey,
};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use super::Depot;

impl Depot {
    /// Create an exporter
    ///
    /// # Errors
    ///
    /// `Validation` if the name is empty or taken, no repositories are given,
    /// a repository is unknown or listed twice, or the path is not an allowed
    /// absolute directory. The path may not equal, contain, or lie inside the
    /// path of another exporter.
    pub async fn create_exporter(&self, exporter: NewExporter) -> Result<ExporterInfo> {
        let name = exporter.name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "exporter name must not be empty"));
        }

        if exporter.repositories.is_empty() {
            return Err(Error::validation(
                "repositories",
                "an exporter needs at least one repository",
            ));
        }

        let mut seen = HashSet::new();
        for repository in &exporter.repositories {
            if !seen.insert(repository.as_str()) {
                return Err(Error::validation(
                    "repositories",
                    format!("repository '{}' listed more than once", repository),
                ));
            }
            if self.db.get_repository(repository).await?.is_none() {
                return Err(Error::validation(
                    "repositories",
                    format!("unknown repository '{}'", repository),
                ));
            }
        }

        let path = self.checked_export_path(&exporter.path, None).await?;
        let id = self
            .db
            .insert_exporter(name, &path, &exporter.repositories)
            .await?;

        tracing::info!(
            exporter_id = %id,
            name = %name,
            path = %path,
            repositories = exporter.repositories.len(),
            "exporter created"
        );
        self.get_exporter(id).await
    }

    /// Get an exporter by id
    pub async fn get_exporter(&self, id: ExporterId) -> Result<ExporterInfo> {
        let row = self
            .db
            .get_exporter(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("exporter {}", id)))?;
        let repositories = self.db.exporter_repositories(id).await?;
        Ok(row.into_info(repositories))
    }

    /// All exporters in creation order
    pub async fn list_exporters(&self) -> Result<Vec<ExporterInfo>> {
        let mut exporters = Vec::new();
        for row in self.db.list_exporters().await? {
            let repositories = self.db.exporter_repositories(row.id.into()).await?;
            exporters.push(row.into_info(repositories));
        }
        Ok(exporters)
    }

    /// Update an exporter's path and/or `last_export` pointer
    ///
    /// `last_export: Some(None)` clears the pointer, which is the only way to
    /// make an exporter deletable again. `Some(Some(id))` must name an export
    /// of this exporter.
    pub async fn update_exporter(
        &self,
        id: ExporterId,
        update: ExporterUpdate,
    ) -> Result<ExporterInfo> {
        if self.db.get_exporter(id).await?.is_none() {
            return Err(Error::NotFound(format!("exporter {}", id)));
        }

        if let Some(path) = &update.path {
            let path = self.checked_export_path(path, Some(id)).await?;
            self.db.update_exporter_path(id, &path).await?;
            tracing::info!(exporter_id = %id, path = %path, "exporter path updated");
        }

        if let Some(last_export) = update.last_export {
            if !self.db.set_last_export(id, last_export).await? {
                return Err(Error::validation(
                    "last_export",
                    format!(
                        "export {} does not belong to exporter {}",
                        display_export(last_export),
                        id
                    ),
                ));
            }
            tracing::info!(exporter_id = %id, last_export = %display_export(last_export), "last_export updated");
        }

        self.get_exporter(id).await
    }

    /// Delete an exporter, its exports, and its directory tree
    ///
    /// Artifacts written before a path change are removed from wherever they
    /// were written.
    ///
    /// # Errors
    ///
    /// `Conflict` while the exporter still has a `last_export` or an export
    /// task is waiting or running for it; `NotFound` if it does not exist.
    pub async fn delete_exporter(&self, id: ExporterId) -> Result<()> {
        let exporter = self.get_exporter(id).await?;

        if self
            .db
            .has_active_task(ResourceKey::exporter(id).as_str())
            .await?
        {
            return Err(Error::Conflict(ConflictError::ExportInProgress {
                exporter_id: id,
            }));
        }

        let artifacts: Vec<PathBuf> = self
            .db
            .list_exports(id)
            .await?
            .into_iter()
            .map(|row| PathBuf::from(row.filename))
            .collect();

        match self.db.delete_exporter(id).await? {
            GuardedDelete::Deleted => {}
            GuardedDelete::Missing => return Err(Error::NotFound(format!("exporter {}", id))),
            GuardedDelete::Protected => {
                let current = self.get_exporter(id).await?.last_export;
                return Err(match current.or(exporter.last_export) {
                    Some(export_id) => Error::Conflict(ConflictError::ExporterHasLastExport {
                        exporter_id: id,
                        export_id,
                    }),
                    None => Error::Other(format!(
                        "exporter {} changed while being deleted, retry the request",
                        id
                    )),
                });
            }
        }

        remove_artifacts(&artifacts, &exporter.path).await;
        remove_tree(&exporter.path).await;
        tracing::info!(exporter_id = %id, name = %exporter.name, "exporter deleted");
        Ok(())
    }

    /// Validate `path` and make sure it does not overlap another exporter
    ///
    /// `owner` is the exporter being updated, whose own path is ignored.
    async fn checked_export_path(&self, path: &Path, owner: Option<ExporterId>) -> Result<String> {
        let path = validate_export_path(path, &self.config.export.allowed_export_paths)?;

        for other in self.db.list_exporters().await? {
            if owner.is_some_and(|id| ExporterId::from(other.id) == id) {
                continue;
            }
            let other_path = Path::new(&other.path);
            if path.starts_with(other_path) || other_path.starts_with(&path) {
                return Err(Error::validation(
                    "path",
                    format!(
                        "{} overlaps the path of exporter '{}' ({})",
                        path.display(),
                        other.name,
                        other_path.display()
                    ),
                ));
            }
        }

        Ok(path.to_string_lossy().into_owned())
    }
}

fn display_export(export: Option<ExportId>) -> String {
    export.map_or_else(|| "null".to_string(), |id| id.to_string())
}

/// Remove artifact files that live outside the exporter's current path, and
/// their directories once empty
async fn remove_artifacts(artifacts: &[PathBuf], current: &Path) {
    let mut directories = BTreeSet::new();
    for artifact in artifacts.iter().filter(|a| !a.starts_with(current)) {
        match tokio::fs::remove_file(artifact).await {
            Ok(()) => tracing::debug!(path = ?artifact, "removed export artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = ?artifact, error = %e, "failed to remove export artifact")
            }
        }
        if let Some(parent) = artifact.parent() {
            directories.insert(parent.to_path_buf());
        }
    }

    // Only succeeds for directories left empty
    for directory in directories {
        let _ = tokio::fs::remove_dir(&directory).await;
    }
}

async fn remove_tree(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!(path = ?path, "removed exporter directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = ?path, error = %e, "failed to remove exporter directory"),
    }
}
