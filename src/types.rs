//! Core types for content-depot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Defines an `i64`-backed identifier newtype usable directly in sqlx queries.
macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

record_id!(
    /// Unique identifier for a task
    TaskId
);
record_id!(
    /// Unique identifier for an exporter
    ExporterId
);
record_id!(
    /// Unique identifier for an export
    ExportId
);

/// Task lifecycle state
///
/// `Waiting -> Running -> {Succeeded | Failed}`, and `Waiting/Running -> Canceled`.
/// Nothing leaves a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Submitted, not yet picked up by a worker
    Waiting,
    /// Executing on a worker
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
    /// Stopped on request before finishing
    Canceled,
}

impl TaskState {
    /// All states that end a task's lifecycle
    pub const TERMINAL: [TaskState; 3] =
        [TaskState::Succeeded, TaskState::Failed, TaskState::Canceled];

    /// Convert integer state code to TaskState
    pub fn from_i32(state: i32) -> Self {
        match state {
            0 => TaskState::Waiting,
            1 => TaskState::Running,
            2 => TaskState::Succeeded,
            3 => TaskState::Failed,
            4 => TaskState::Canceled,
            _ => TaskState::Failed, // Unknown codes are treated as failures
        }
    }

    /// Convert TaskState to integer state code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskState::Waiting => 0,
            TaskState::Running => 1,
            TaskState::Succeeded => 2,
            TaskState::Failed => 3,
            TaskState::Canceled => 4,
        }
    }

    /// Whether the task has reached the end of its lifecycle
    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(TaskState::Waiting),
            "running" => Ok(TaskState::Running),
            "succeeded" => Ok(TaskState::Succeeded),
            "failed" => Ok(TaskState::Failed),
            "canceled" => Ok(TaskState::Canceled),
            other => Err(format!("unknown task state '{}'", other)),
        }
    }
}

/// What a task does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Repository sync from remote feeds
    Sync,
    /// Exporter snapshot export
    Export,
}

impl TaskKind {
    /// Convert integer kind code to TaskKind
    pub fn from_i32(kind: i32) -> Self {
        match kind {
            1 => TaskKind::Export,
            _ => TaskKind::Sync,
        }
    }

    /// Convert TaskKind to integer kind code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskKind::Sync => 0,
            TaskKind::Export => 1,
        }
    }
}

/// Key under which task execution is serialized
///
/// At most one task per key runs at a time, and tasks sharing a key start in
/// submission order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ResourceKey(pub String);

impl ResourceKey {
    /// Key for work that mutates a repository
    pub fn repository(name: &str) -> Self {
        Self(format!("repository:{}", name))
    }

    /// Key for work that mutates an exporter and its export directory
    pub fn exporter(id: ExporterId) -> Self {
        Self(format!("exporter:{}", id))
    }

    /// Borrow the key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resource produced by a successful task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CreatedResource {
    /// New repository version created by a sync
    RepositoryVersion {
        /// Repository name
        repository: String,
        /// Version number
        number: i64,
    },
    /// New export created by an export task
    Export {
        /// Exporter the export belongs to
        exporter_id: ExporterId,
        /// The new export
        export_id: ExportId,
    },
}

/// Error recorded on a failed task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskError {
    /// Machine-readable error code (same codes as API errors)
    pub code: String,
    /// Human-readable description
    pub message: String,
}

impl From<&crate::error::Error> for TaskError {
    fn from(error: &crate::error::Error) -> Self {
        use crate::error::ToHttpStatus;
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Snapshot of a task record
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskInfo {
    /// Unique task identifier
    pub id: TaskId,
    /// What the task does
    pub kind: TaskKind,
    /// Human-readable description
    pub name: String,
    /// Serialization key
    pub resource_key: ResourceKey,
    /// Current lifecycle state
    pub state: TaskState,
    /// Resources produced (only populated once Succeeded)
    pub created_resources: Vec<CreatedResource>,
    /// Failure details (only present once Failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    /// When the task was submitted
    pub created_at: DateTime<Utc>,
    /// When a worker picked the task up
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

/// Remote feed configuration attached to a repository
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NewRemote {
    /// URL of the feed manifest
    pub url: String,
    /// PEM-encoded CA certificate used to verify the feed
    #[serde(default)]
    pub ca_cert: Option<String>,
    /// PEM-encoded client certificate and private key
    #[serde(default)]
    pub client_cert: Option<String>,
}

/// Request to create a repository
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NewRepository {
    /// Repository name (unique identifier)
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Remote feeds to sync from
    #[serde(default)]
    pub remotes: Vec<NewRemote>,
}

impl NewRepository {
    /// Repository with a name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            remotes: Vec::new(),
        }
    }

    /// Attach a remote feed
    pub fn with_remote(mut self, remote: NewRemote) -> Self {
        self.remotes.push(remote);
        self
    }
}

/// Remote feed as exposed to callers (TLS material is never echoed back)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoteInfo {
    /// Remote id
    pub id: i64,
    /// Manifest URL
    pub url: String,
    /// Whether a CA certificate is configured
    pub has_ca_cert: bool,
    /// Whether a client certificate is configured
    pub has_client_cert: bool,
}

/// Repository as exposed to callers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RepositoryInfo {
    /// Repository name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Number of the newest version
    pub latest_version: i64,
    /// Configured remote feeds
    pub remotes: Vec<RemoteInfo>,
    /// When the repository was created
    pub created_at: DateTime<Utc>,
}

/// Immutable numbered content set of a repository
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RepositoryVersionInfo {
    /// Repository name
    pub repository: String,
    /// Version number (0 is the empty initial version)
    pub number: i64,
    /// Number of content units in this version
    pub unit_count: i64,
    /// Task that created the version (None for version 0)
    pub task_id: Option<TaskId>,
    /// When the version was created
    pub created_at: DateTime<Utc>,
}

/// Options for a sync
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SyncOptions {
    /// Make the new version exactly match the remote content (drop local extras)
    #[serde(default)]
    pub mirror: bool,
}

/// Request to create an exporter
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NewExporter {
    /// Unique exporter name
    pub name: String,
    /// Repositories to export (captured now, immutable afterwards)
    pub repositories: Vec<String>,
    /// Target directory for export artifacts
    pub path: PathBuf,
}

/// Partial update of an exporter
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ExporterUpdate {
    /// New target directory
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// New `last_export` pointer; `Some(None)` (JSON `null`) clears it
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<i64>)]
    pub last_export: Option<Option<ExportId>>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Exporter as exposed to callers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExporterInfo {
    /// Exporter id
    pub id: ExporterId,
    /// Unique name
    pub name: String,
    /// Target directory
    pub path: PathBuf,
    /// Repositories captured at creation
    pub repositories: Vec<String>,
    /// Most recent export (protected from deletion)
    pub last_export: Option<ExportId>,
    /// When the exporter was created
    pub created_at: DateTime<Utc>,
}

/// One repository snapshot included in an export
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExportedResource {
    /// Repository name
    pub repository: String,
    /// Version captured
    pub version: i64,
}

/// Export as exposed to callers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExportInfo {
    /// Export id
    pub id: ExportId,
    /// Owning exporter
    pub exporter_id: ExporterId,
    /// Task that produced the export
    pub task_id: Option<TaskId>,
    /// Absolute path of the artifact
    pub filename: PathBuf,
    /// Hex sha256 of the artifact bytes
    pub sha256: String,
    /// Repository snapshots captured
    pub exported_resources: Vec<ExportedResource>,
    /// When the export was recorded
    pub created_at: DateTime<Utc>,
}

/// Event emitted on task and resource lifecycle changes
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task changed state
    TaskStateChanged {
        /// Task id
        id: TaskId,
        /// Task kind
        kind: TaskKind,
        /// New state
        state: TaskState,
    },

    /// A sync created a new repository version
    RepositoryVersionCreated {
        /// Repository name
        repository: String,
        /// New version number
        number: i64,
    },

    /// An export task recorded a new export
    ExportCreated {
        /// Exporter id
        exporter_id: ExporterId,
        /// Export id
        export_id: ExportId,
    },

    /// An export was deleted
    ExportDeleted {
        /// Exporter id
        exporter_id: ExporterId,
        /// Export id
        export_id: ExportId,
    },

    /// The depot is shutting down
    Shutdown,
}

/// Convert a stored unix timestamp to a UTC datetime
pub(crate) fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}
