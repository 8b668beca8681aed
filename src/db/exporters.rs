//! Exporter CRUD and the `last_export` pointer.

use crate::types::{ExportId, ExporterId};
use crate::{Error, Result};

use super::{Database, ExporterRow, GuardedDelete, query_failed};

impl Database {
    /// Insert an exporter with its repository list
    ///
    /// A duplicate name is reported as a validation error on `name`.
    pub async fn insert_exporter(
        &self,
        name: &str,
        path: &str,
        repositories: &[String],
    ) -> Result<ExporterId> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("Failed to begin transaction"))?;

        let result = sqlx::query(
            r#"
            INSERT INTO exporters (name, path, last_export_id, created_at)
            VALUES (?, ?, NULL, ?)
            "#,
        )
        .bind(name)
        .bind(path)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => Error::validation(
                "name",
                format!("an exporter named '{}' already exists", name),
            ),
            e => query_failed("Failed to insert exporter")(e),
        })?;

        let id = ExporterId(result.last_insert_rowid());

        for (position, repository) in repositories.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO exporter_repositories (exporter_id, repository, position)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(repository)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("Failed to insert exporter repository"))?;
        }

        tx.commit()
            .await
            .map_err(query_failed("Failed to commit exporter"))?;

        Ok(id)
    }

    /// Get an exporter by ID
    pub async fn get_exporter(&self, id: ExporterId) -> Result<Option<ExporterRow>> {
        let row = sqlx::query_as::<_, ExporterRow>(
            r#"
            SELECT id, name, path, last_export_id, created_at
            FROM exporters
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to get exporter"))?;

        Ok(row)
    }

    /// List all exporters in creation order
    pub async fn list_exporters(&self) -> Result<Vec<ExporterRow>> {
        let rows = sqlx::query_as::<_, ExporterRow>(
            r#"
            SELECT id, name, path, last_export_id, created_at
            FROM exporters
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list exporters"))?;

        Ok(rows)
    }

    /// Repository names of an exporter, in the order they were given
    pub async fn exporter_repositories(&self, id: ExporterId) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT repository FROM exporter_repositories
            WHERE exporter_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list exporter repositories"))?;

        Ok(names)
    }

    /// Change an exporter's target directory
    pub async fn update_exporter_path(&self, id: ExporterId, path: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE exporters SET path = ? WHERE id = ?")
            .bind(path)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("Failed to update exporter path"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the `last_export` pointer
    ///
    /// Setting only succeeds when the export belongs to this exporter.
    pub async fn set_last_export(&self, id: ExporterId, export: Option<ExportId>) -> Result<bool> {
        let result = match export {
            Some(export_id) => {
                sqlx::query(
                    r#"
                    UPDATE exporters SET last_export_id = ?
                    WHERE id = ?
                      AND EXISTS (SELECT 1 FROM exports WHERE id = ? AND exporter_id = ?)
                    "#,
                )
                .bind(export_id)
                .bind(id)
                .bind(export_id)
                .bind(id)
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query("UPDATE exporters SET last_export_id = NULL WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(query_failed("Failed to set last export"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an exporter unless it still points at a last export
    ///
    /// Its exports and their resources go with it.
    pub async fn delete_exporter(&self, id: ExporterId) -> Result<GuardedDelete> {
        let result = sqlx::query("DELETE FROM exporters WHERE id = ? AND last_export_id IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("Failed to delete exporter"))?;

        if result.rows_affected() > 0 {
            return Ok(GuardedDelete::Deleted);
        }

        match self.get_exporter(id).await? {
            Some(_) => Ok(GuardedDelete::Protected),
            None => Ok(GuardedDelete::Missing),
        }
    }
}
