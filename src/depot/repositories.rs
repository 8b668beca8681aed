//! Repositories, their versions, and sync submission.

use crate::error::{Error, Result};
use crate::sync::SyncWork;
use crate::types::{
    NewRepository, RepositoryInfo, RepositoryVersionInfo, SyncOptions, TaskInfo,
};

use super::Depot;

/// Longest accepted repository name
const MAX_NAME_LEN: usize = 255;

fn validate_repository(repository: &NewRepository) -> Result<()> {
    let name = &repository.name;
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::validation(
            "name",
            format!("repository name must be 1-{} characters", MAX_NAME_LEN),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::validation(
            "name",
            format!(
                "repository name '{}' may only contain letters, digits, '-', '_' and '.'",
                name
            ),
        ));
    }

    for remote in &repository.remotes {
        let url = url::Url::parse(&remote.url).map_err(|e| {
            Error::validation("remotes", format!("invalid remote url '{}': {}", remote.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(
                "remotes",
                format!("remote url '{}' must use http or https", remote.url),
            ));
        }
    }

    Ok(())
}

impl Depot {
    /// Create a repository, or return the existing one with the same name
    ///
    /// Creation is idempotent: a second call with an existing name changes
    /// nothing (its remotes are ignored) and returns the stored repository.
    pub async fn create_repository(&self, repository: NewRepository) -> Result<RepositoryInfo> {
        validate_repository(&repository)?;

        if self.db.create_repository(&repository).await? {
            tracing::info!(
                repository = %repository.name,
                remotes = repository.remotes.len(),
                "repository created"
            );
        } else {
            tracing::debug!(repository = %repository.name, "repository already exists, reusing");
        }

        self.get_repository(&repository.name).await
    }

    /// Get a repository by name
    pub async fn get_repository(&self, name: &str) -> Result<RepositoryInfo> {
        let row = self
            .db
            .get_repository(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("repository '{}'", name)))?;
        let remotes = self.db.list_remotes(name).await?;
        Ok(row.into_info(remotes))
    }

    /// All repositories, ordered by name
    pub async fn list_repositories(&self) -> Result<Vec<RepositoryInfo>> {
        let mut repositories = Vec::new();
        for row in self.db.list_repositories().await? {
            let remotes = self.db.list_remotes(&row.name).await?;
            repositories.push(row.into_info(remotes));
        }
        Ok(repositories)
    }

    /// Versions of a repository, oldest first
    pub async fn list_repository_versions(
        &self,
        name: &str,
    ) -> Result<Vec<RepositoryVersionInfo>> {
        if self.db.get_repository(name).await?.is_none() {
            return Err(Error::NotFound(format!("repository '{}'", name)));
        }
        let rows = self.db.list_repository_versions(name).await?;
        Ok(rows.into_iter().map(RepositoryVersionInfo::from).collect())
    }

    /// Schedule an additive sync of a repository
    ///
    /// See [`sync_with_options`](Self::sync_with_options).
    pub async fn sync(&self, name: &str) -> Result<Option<TaskInfo>> {
        self.sync_with_options(name, SyncOptions::default()).await
    }

    /// Schedule a sync of a repository
    ///
    /// Returns `Ok(None)` when the sync cannot be scheduled: the repository
    /// is unknown, has no remotes, or already has a Waiting or Running sync.
    /// `Err` is reserved for scheduling failures.
    pub async fn sync_with_options(
        &self,
        name: &str,
        options: SyncOptions,
    ) -> Result<Option<TaskInfo>> {
        if self.db.get_repository(name).await?.is_none() {
            tracing::warn!(repository = %name, "sync requested for unknown repository");
            return Ok(None);
        }
        if self.db.list_remotes(name).await?.is_empty() {
            tracing::warn!(repository = %name, "sync requested for repository without remotes");
            return Ok(None);
        }

        let work = SyncWork::new(
            self.db.clone(),
            self.store.clone(),
            self.feed.clone(),
            self.event_tx.clone(),
            name,
            options,
        );
        let task = self.scheduler.submit_exclusive(work).await?;

        match &task {
            Some(info) => {
                tracing::info!(repository = %name, task_id = %info.id, mirror = options.mirror, "sync scheduled")
            }
            None => tracing::info!(repository = %name, "sync already in progress, not scheduling"),
        }
        Ok(task)
    }
}
