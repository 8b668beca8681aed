//! Task lookup and cancellation.

use crate::error::{Error, Result};
use crate::types::{TaskId, TaskInfo, TaskState};

use super::Depot;

impl Depot {
    /// Current snapshot of a task, `None` if the id was never issued
    pub async fn lookup_task(&self, id: TaskId) -> Result<Option<TaskInfo>> {
        self.scheduler.lookup(id).await
    }

    /// Current snapshot of a task
    pub async fn get_task(&self, id: TaskId) -> Result<TaskInfo> {
        self.lookup_task(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))
    }

    /// All tasks in submission order, optionally only those in `state`
    pub async fn list_tasks(&self, state: Option<TaskState>) -> Result<Vec<TaskInfo>> {
        self.scheduler.list(state).await
    }

    /// Request cancellation of a task
    ///
    /// Waiting tasks are canceled at once. Running tasks stop at their next
    /// cancellation checkpoint; a task that finishes first keeps its result.
    /// Canceling a finished task changes nothing.
    pub async fn cancel_task(&self, id: TaskId) -> Result<TaskInfo> {
        self.scheduler.cancel(id).await
    }

    /// Number of tasks queued and number executing, in that order
    pub async fn task_load(&self) -> (usize, usize) {
        (
            self.scheduler.queued_count().await,
            self.scheduler.running_count().await,
        )
    }
}
