//! Export records and protected deletion.

use crate::error::DatabaseError;
use crate::types::{ExportId, ExportedResource, ExporterId, TaskId};
use crate::{Error, Result};

use super::{Database, ExportResourceRow, ExportRow, GuardedDelete, query_failed};

/// Fields of an export about to be recorded
#[derive(Debug, Clone)]
pub struct NewExport<'a> {
    /// Owning exporter
    pub exporter_id: ExporterId,
    /// Task that produced the artifact
    pub task_id: Option<TaskId>,
    /// Absolute artifact path
    pub filename: &'a str,
    /// Hex sha256 of the artifact
    pub sha256: &'a str,
    /// Repository snapshots captured
    pub resources: &'a [ExportedResource],
}

impl Database {
    /// Record an export and make it the exporter's `last_export`
    ///
    /// Insert and pointer move are one transaction; if the exporter vanished
    /// meanwhile nothing is recorded.
    pub async fn record_export(&self, export: &NewExport<'_>) -> Result<ExportId> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("Failed to begin transaction"))?;

        let result = sqlx::query(
            r#"
            INSERT INTO exports (exporter_id, task_id, filename, sha256, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(export.exporter_id)
        .bind(export.task_id)
        .bind(export.filename)
        .bind(export.sha256)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(query_failed("Failed to insert export"))?;

        let id = ExportId(result.last_insert_rowid());

        for resource in export.resources {
            sqlx::query(
                r#"
                INSERT INTO export_resources (export_id, repository, version)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(&resource.repository)
            .bind(resource.version)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("Failed to insert export resource"))?;
        }

        let moved = sqlx::query("UPDATE exporters SET last_export_id = ? WHERE id = ?")
            .bind(id)
            .bind(export.exporter_id)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("Failed to move last export"))?;

        if moved.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "exporter {} no longer exists",
                export.exporter_id
            ))));
        }

        tx.commit()
            .await
            .map_err(query_failed("Failed to commit export"))?;

        Ok(id)
    }

    /// Get an export belonging to an exporter
    pub async fn get_export(
        &self,
        exporter_id: ExporterId,
        export_id: ExportId,
    ) -> Result<Option<ExportRow>> {
        let row = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT id, exporter_id, task_id, filename, sha256, created_at
            FROM exports
            WHERE id = ? AND exporter_id = ?
            "#,
        )
        .bind(export_id)
        .bind(exporter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to get export"))?;

        Ok(row)
    }

    /// List the exports of an exporter in creation order
    pub async fn list_exports(&self, exporter_id: ExporterId) -> Result<Vec<ExportRow>> {
        let rows = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT id, exporter_id, task_id, filename, sha256, created_at
            FROM exports
            WHERE exporter_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(exporter_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list exports"))?;

        Ok(rows)
    }

    /// Repository snapshots captured by an export
    pub async fn export_resources(&self, export_id: ExportId) -> Result<Vec<ExportResourceRow>> {
        let rows = sqlx::query_as::<_, ExportResourceRow>(
            r#"
            SELECT repository, version FROM export_resources
            WHERE export_id = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(export_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list export resources"))?;

        Ok(rows)
    }

    /// Delete an export unless it is its exporter's `last_export`
    ///
    /// The protection check and the delete are a single statement.
    pub async fn delete_export(
        &self,
        exporter_id: ExporterId,
        export_id: ExportId,
    ) -> Result<GuardedDelete> {
        let result = sqlx::query(
            r#"
            DELETE FROM exports
            WHERE id = ? AND exporter_id = ?
              AND NOT EXISTS (SELECT 1 FROM exporters WHERE last_export_id = exports.id)
            "#,
        )
        .bind(export_id)
        .bind(exporter_id)
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to delete export"))?;

        if result.rows_affected() > 0 {
            return Ok(GuardedDelete::Deleted);
        }

        match self.get_export(exporter_id, export_id).await? {
            Some(_) => Ok(GuardedDelete::Protected),
            None => Ok(GuardedDelete::Missing),
        }
    }
}
