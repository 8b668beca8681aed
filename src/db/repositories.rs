//! Repositories, remotes, and version listings.

use crate::Result;
use crate::types::NewRepository;

use super::{Database, RemoteRow, RepositoryRow, RepositoryVersionRow, query_failed};

impl Database {
    /// Create a repository with its remotes and the empty version 0
    ///
    /// Returns false (and changes nothing) if a repository with this name
    /// already exists.
    pub async fn create_repository(&self, repository: &NewRepository) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("Failed to begin transaction"))?;

        let result = sqlx::query(
            r#"
            INSERT INTO repositories (name, description, latest_version, created_at)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(&repository.name)
        .bind(&repository.description)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(query_failed("Failed to insert repository"))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO repository_versions (repository, number, task_id, created_at)
            VALUES (?, 0, NULL, ?)
            "#,
        )
        .bind(&repository.name)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(query_failed("Failed to insert initial version"))?;

        for remote in &repository.remotes {
            sqlx::query(
                r#"
                INSERT INTO remotes (repository, url, ca_cert, client_cert)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&repository.name)
            .bind(&remote.url)
            .bind(&remote.ca_cert)
            .bind(&remote.client_cert)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("Failed to insert remote"))?;
        }

        tx.commit()
            .await
            .map_err(query_failed("Failed to commit repository"))?;

        Ok(true)
    }

    /// Get a repository by name
    pub async fn get_repository(&self, name: &str) -> Result<Option<RepositoryRow>> {
        let row = sqlx::query_as::<_, RepositoryRow>(
            r#"
            SELECT name, description, latest_version, created_at
            FROM repositories
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to get repository"))?;

        Ok(row)
    }

    /// List all repositories by name
    pub async fn list_repositories(&self) -> Result<Vec<RepositoryRow>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            r#"
            SELECT name, description, latest_version, created_at
            FROM repositories
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list repositories"))?;

        Ok(rows)
    }

    /// List the remotes of a repository in creation order
    pub async fn list_remotes(&self, repository: &str) -> Result<Vec<RemoteRow>> {
        let rows = sqlx::query_as::<_, RemoteRow>(
            r#"
            SELECT id, repository, url, ca_cert, client_cert
            FROM remotes
            WHERE repository = ?
            ORDER BY id ASC
            "#,
        )
        .bind(repository)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list remotes"))?;

        Ok(rows)
    }

    /// List the versions of a repository, oldest first
    pub async fn list_repository_versions(
        &self,
        repository: &str,
    ) -> Result<Vec<RepositoryVersionRow>> {
        let rows = sqlx::query_as::<_, RepositoryVersionRow>(
            r#"
            SELECT
                v.repository, v.number, v.task_id, v.created_at,
                COUNT(c.unit_id) AS unit_count
            FROM repository_versions v
            LEFT JOIN repository_version_content c
                ON c.repository = v.repository AND c.number = v.number
            WHERE v.repository = ?
            GROUP BY v.repository, v.number
            ORDER BY v.number ASC
            "#,
        )
        .bind(repository)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list repository versions"))?;

        Ok(rows)
    }
}
