//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - Task status and cancellation
//! - [`repositories`] - Repositories, versions, and sync
//! - [`exporters`] - Exporter management
//! - [`exports`] - Export creation, listing, and deletion
//! - [`system`] - Health, events, OpenAPI

use crate::types::{TaskInfo, TaskState};
use serde::{Deserialize, Serialize};

mod exporters;
mod exports;
mod repositories;
mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` works
pub use exporters::*;
pub use exports::*;
pub use repositories::*;
pub use system::*;
pub use tasks::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /tasks
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams, utoipa::ToSchema)]
pub struct ListTasksQuery {
    /// Only return tasks in this state
    pub state: Option<TaskState>,
}

/// Response for POST /repositories/:name/sync
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SyncResponse {
    /// Whether a new sync task was scheduled
    pub scheduled: bool,
    /// The scheduled task; `null` when the repository has no remotes or a
    /// sync is already waiting or running
    pub task: Option<TaskInfo>,
}
