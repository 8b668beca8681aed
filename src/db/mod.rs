//! Database layer for content-depot
//!
//! Handles SQLite persistence for tasks, repositories, content, exporters, and
//! exports.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`tasks`] - Task records and conditional state transitions
//! - [`repositories`] - Repositories, remotes, and version listings
//! - [`content`] - Content units and repository version creation
//! - [`exporters`] - Exporter CRUD and the `last_export` pointer
//! - [`exports`] - Export records and protected deletion
//! - [`state`] - Runtime state (shutdown tracking)

use crate::error::DatabaseError;
use crate::types::{
    CreatedResource, ExportId, ExportInfo, ExportedResource, ExporterId, ExporterInfo,
    RemoteInfo, RepositoryInfo, RepositoryVersionInfo, TaskError, TaskId, TaskInfo, TaskKind,
    TaskState, timestamp,
};
use crate::{Error, Result};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod content;
mod exporters;
mod exports;
mod migrations;
mod repositories;
mod state;
mod tasks;

pub use exports::NewExport;

/// New task to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewTask {
    /// What the task does
    pub kind: TaskKind,
    /// Human-readable description
    pub name: String,
    /// Serialization key
    pub resource_key: String,
}

/// Task record from database
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique database ID
    pub id: i64,
    /// Task kind code (see [`TaskKind::to_i32`])
    pub kind: i32,
    /// Human-readable description
    pub name: String,
    /// Serialization key
    pub resource_key: String,
    /// Task state code (see [`TaskState::to_i32`])
    pub state: i32,
    /// JSON array of created resources
    pub created_resources: String,
    /// Error code if the task failed
    pub error_code: Option<String>,
    /// Error message if the task failed
    pub error_message: Option<String>,
    /// Unix timestamp when the task was submitted
    pub created_at: i64,
    /// Unix timestamp when a worker picked the task up
    pub started_at: Option<i64>,
    /// Unix timestamp when the task reached a terminal state
    pub finished_at: Option<i64>,
}

impl TaskRow {
    /// Convert to the public task snapshot
    pub fn into_info(self) -> Result<TaskInfo> {
        let created_resources: Vec<CreatedResource> =
            serde_json::from_str(&self.created_resources)?;
        let error = match (self.error_code, self.error_message) {
            (Some(code), message) => Some(TaskError {
                code,
                message: message.unwrap_or_default(),
            }),
            (None, _) => None,
        };

        Ok(TaskInfo {
            id: TaskId(self.id),
            kind: TaskKind::from_i32(self.kind),
            name: self.name,
            resource_key: crate::types::ResourceKey(self.resource_key),
            state: TaskState::from_i32(self.state),
            created_resources,
            error,
            created_at: timestamp(self.created_at),
            started_at: self.started_at.map(timestamp),
            finished_at: self.finished_at.map(timestamp),
        })
    }
}

/// Repository record from database
#[derive(Debug, Clone, FromRow)]
pub struct RepositoryRow {
    /// Repository name (primary key)
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Number of the newest version
    pub latest_version: i64,
    /// Unix timestamp when the repository was created
    pub created_at: i64,
}

impl RepositoryRow {
    /// Combine with the repository's remotes into the public view
    pub fn into_info(self, remotes: Vec<RemoteRow>) -> RepositoryInfo {
        RepositoryInfo {
            name: self.name,
            description: self.description,
            latest_version: self.latest_version,
            remotes: remotes.into_iter().map(RemoteRow::into_info).collect(),
            created_at: timestamp(self.created_at),
        }
    }
}

/// Remote feed record from database
#[derive(Debug, Clone, FromRow)]
pub struct RemoteRow {
    /// Unique database ID
    pub id: i64,
    /// Owning repository
    pub repository: String,
    /// Manifest URL
    pub url: String,
    /// PEM CA certificate
    pub ca_cert: Option<String>,
    /// PEM client certificate and key
    pub client_cert: Option<String>,
}

impl RemoteRow {
    fn into_info(self) -> RemoteInfo {
        RemoteInfo {
            id: self.id,
            url: self.url,
            has_ca_cert: self.ca_cert.is_some(),
            has_client_cert: self.client_cert.is_some(),
        }
    }
}

/// Repository version record (with its unit count) from database
#[derive(Debug, Clone, FromRow)]
pub struct RepositoryVersionRow {
    /// Repository name
    pub repository: String,
    /// Version number
    pub number: i64,
    /// Task that created this version
    pub task_id: Option<i64>,
    /// Unix timestamp when the version was created
    pub created_at: i64,
    /// Number of content units in the version
    pub unit_count: i64,
}

impl From<RepositoryVersionRow> for RepositoryVersionInfo {
    fn from(row: RepositoryVersionRow) -> Self {
        RepositoryVersionInfo {
            repository: row.repository,
            number: row.number,
            unit_count: row.unit_count,
            task_id: row.task_id.map(TaskId),
            created_at: timestamp(row.created_at),
        }
    }
}

/// A content unit: one file identified by path and digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, FromRow)]
pub struct ContentUnit {
    /// Path of the file inside the repository
    pub relative_path: String,
    /// Hex sha256 of the file bytes
    pub sha256: String,
    /// Size in bytes
    pub size: i64,
}

/// Exporter record from database
#[derive(Debug, Clone, FromRow)]
pub struct ExporterRow {
    /// Unique database ID
    pub id: i64,
    /// Unique exporter name
    pub name: String,
    /// Target directory
    pub path: String,
    /// Current `last_export` pointer
    pub last_export_id: Option<i64>,
    /// Unix timestamp when the exporter was created
    pub created_at: i64,
}

impl ExporterRow {
    /// Combine with the exporter's repository list into the public view
    pub fn into_info(self, repositories: Vec<String>) -> ExporterInfo {
        ExporterInfo {
            id: ExporterId(self.id),
            name: self.name,
            path: PathBuf::from(self.path),
            repositories,
            last_export: self.last_export_id.map(ExportId),
            created_at: timestamp(self.created_at),
        }
    }
}

/// Export record from database
#[derive(Debug, Clone, FromRow)]
pub struct ExportRow {
    /// Unique database ID
    pub id: i64,
    /// Owning exporter
    pub exporter_id: i64,
    /// Task that produced the export
    pub task_id: Option<i64>,
    /// Absolute artifact path
    pub filename: String,
    /// Hex sha256 of the artifact
    pub sha256: String,
    /// Unix timestamp when the export was recorded
    pub created_at: i64,
}

impl ExportRow {
    /// Combine with the exported resources into the public view
    pub fn into_info(self, exported_resources: Vec<ExportedResource>) -> ExportInfo {
        ExportInfo {
            id: ExportId(self.id),
            exporter_id: ExporterId(self.exporter_id),
            task_id: self.task_id.map(TaskId),
            filename: PathBuf::from(self.filename),
            sha256: self.sha256,
            exported_resources,
            created_at: timestamp(self.created_at),
        }
    }
}

/// Repository snapshot row of an export
#[derive(Debug, Clone, FromRow)]
pub struct ExportResourceRow {
    /// Repository name
    pub repository: String,
    /// Version captured
    pub version: i64,
}

impl From<ExportResourceRow> for ExportedResource {
    fn from(row: ExportResourceRow) -> Self {
        ExportedResource {
            repository: row.repository,
            version: row.version,
        }
    }
}

/// Result of a delete guarded by a protection condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedDelete {
    /// The row was removed
    Deleted,
    /// No such row
    Missing,
    /// The row exists but is protected
    Protected,
}

/// Database handle for content-depot
pub struct Database {
    pool: SqlitePool,
}

/// Build a `map_err` closure that wraps a sqlx error with context
pub(crate) fn query_failed(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::QueryFailed(format!("{}: {}", context, e)))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
