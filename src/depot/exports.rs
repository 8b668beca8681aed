//! Export submission, listing, and protected deletion.

use crate::db::GuardedDelete;
use crate::error::{ConflictError, Error, Result};
use crate::export::ExportWork;
use crate::types::{Event, ExportId, ExportInfo, ExportedResource, ExporterId, TaskInfo};

use super::Depot;

impl Depot {
    /// Schedule an export of an exporter
    ///
    /// Returns the Waiting task immediately. Exports of the same exporter run
    /// one at a time in submission order; each successful one becomes the
    /// exporter's `last_export`.
    pub async fn export(&self, exporter_id: ExporterId) -> Result<TaskInfo> {
        if self.db.get_exporter(exporter_id).await?.is_none() {
            return Err(Error::NotFound(format!("exporter {}", exporter_id)));
        }

        let work = ExportWork::new(
            self.db.clone(),
            self.store.clone(),
            self.event_tx.clone(),
            exporter_id,
        );
        let task = self.scheduler.submit(work).await?;
        tracing::info!(exporter_id = %exporter_id, task_id = %task.id, "export scheduled");
        Ok(task)
    }

    /// Exports of an exporter, oldest first
    pub async fn list_exports(&self, exporter_id: ExporterId) -> Result<Vec<ExportInfo>> {
        if self.db.get_exporter(exporter_id).await?.is_none() {
            return Err(Error::NotFound(format!("exporter {}", exporter_id)));
        }

        let mut exports = Vec::new();
        for row in self.db.list_exports(exporter_id).await? {
            let resources = self.export_resources(ExportId(row.id)).await?;
            exports.push(row.into_info(resources));
        }
        Ok(exports)
    }

    /// Get one export of an exporter
    pub async fn get_export(
        &self,
        exporter_id: ExporterId,
        export_id: ExportId,
    ) -> Result<ExportInfo> {
        let row = self
            .db
            .get_export(exporter_id, export_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("export {} of exporter {}", export_id, exporter_id))
            })?;
        let resources = self.export_resources(export_id).await?;
        Ok(row.into_info(resources))
    }

    /// Delete an export and its artifact file
    ///
    /// # Errors
    ///
    /// `Conflict` if the export is its exporter's `last_export` (the export is
    /// left untouched); `NotFound` if it does not exist.
    pub async fn delete_export(&self, exporter_id: ExporterId, export_id: ExportId) -> Result<()> {
        let export = self.get_export(exporter_id, export_id).await?;

        match self.db.delete_export(exporter_id, export_id).await? {
            GuardedDelete::Deleted => {}
            GuardedDelete::Missing => {
                return Err(Error::NotFound(format!(
                    "export {} of exporter {}",
                    export_id, exporter_id
                )));
            }
            GuardedDelete::Protected => {
                tracing::warn!(
                    exporter_id = %exporter_id,
                    export_id = %export_id,
                    "refusing to delete the exporter's last export"
                );
                return Err(Error::Conflict(ConflictError::LastExportProtected {
                    exporter_id,
                    export_id,
                }));
            }
        }

        match tokio::fs::remove_file(&export.filename).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(filename = ?export.filename, "artifact already gone");
            }
            Err(e) => {
                tracing::warn!(filename = ?export.filename, error = %e, "failed to remove artifact");
            }
        }

        tracing::info!(exporter_id = %exporter_id, export_id = %export_id, "export deleted");
        self.emit_event(Event::ExportDeleted {
            exporter_id,
            export_id,
        });
        Ok(())
    }

    async fn export_resources(&self, export_id: ExportId) -> Result<Vec<ExportedResource>> {
        Ok(self
            .db
            .export_resources(export_id)
            .await?
            .into_iter()
            .map(ExportedResource::from)
            .collect())
    }
}
