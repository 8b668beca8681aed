//! Content units and repository version creation.

use crate::error::DatabaseError;
use crate::types::TaskId;
use crate::{Error, Result};

use super::{ContentUnit, Database, query_failed};

impl Database {
    /// List the content of one repository version, ordered by path
    pub async fn version_content(&self, repository: &str, number: i64) -> Result<Vec<ContentUnit>> {
        let rows = sqlx::query_as::<_, ContentUnit>(
            r#"
            SELECT u.relative_path, u.sha256, u.size
            FROM repository_version_content c
            JOIN content_units u ON u.id = c.unit_id
            WHERE c.repository = ? AND c.number = ?
            ORDER BY u.relative_path ASC, u.sha256 ASC
            "#,
        )
        .bind(repository)
        .bind(number)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list version content"))?;

        Ok(rows)
    }

    /// Create version `base_version + 1` of a repository holding exactly `units`
    ///
    /// The version row, its content, and the `latest_version` bump are one
    /// transaction. Fails if the repository's latest version is no longer
    /// `base_version`.
    pub async fn create_repository_version(
        &self,
        repository: &str,
        base_version: i64,
        task_id: Option<TaskId>,
        units: &[ContentUnit],
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let number = base_version + 1;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("Failed to begin transaction"))?;

        let bumped = sqlx::query(
            r#"
            UPDATE repositories SET latest_version = ?
            WHERE name = ? AND latest_version = ?
            "#,
        )
        .bind(number)
        .bind(repository)
        .bind(base_version)
        .execute(&mut *tx)
        .await
        .map_err(query_failed("Failed to bump latest version"))?;

        if bumped.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::ConstraintViolation(format!(
                "repository '{}' is no longer at version {}",
                repository, base_version
            ))));
        }

        sqlx::query(
            r#"
            INSERT INTO repository_versions (repository, number, task_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(repository)
        .bind(number)
        .bind(task_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(query_failed("Failed to insert repository version"))?;

        for unit in units {
            sqlx::query(
                r#"
                INSERT INTO content_units (relative_path, sha256, size)
                VALUES (?, ?, ?)
                ON CONFLICT(relative_path, sha256) DO NOTHING
                "#,
            )
            .bind(&unit.relative_path)
            .bind(&unit.sha256)
            .bind(unit.size)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("Failed to insert content unit"))?;

            sqlx::query(
                r#"
                INSERT INTO repository_version_content (repository, number, unit_id)
                SELECT ?, ?, id FROM content_units
                WHERE relative_path = ? AND sha256 = ?
                "#,
            )
            .bind(repository)
            .bind(number)
            .bind(&unit.relative_path)
            .bind(&unit.sha256)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("Failed to link content unit"))?;
        }

        tx.commit()
            .await
            .map_err(query_failed("Failed to commit repository version"))?;

        Ok(number)
    }
}
