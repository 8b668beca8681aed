//! Task cancellation.

use crate::error::{Error, Result};
use crate::types::{Event, TaskId, TaskInfo, TaskState};

use super::TaskScheduler;

impl TaskScheduler {
    /// Request cancellation of a task
    ///
    /// - Waiting: removed from the queue and marked Canceled immediately.
    /// - Running: its cancellation token is signalled; the task is marked
    ///   Canceled when its work stops at the next checkpoint. Work that
    ///   finishes first still succeeds.
    /// - Terminal: nothing happens.
    ///
    /// Returns the task snapshot after the request. Unknown ids are
    /// [`Error::NotFound`].
    pub async fn cancel(&self, id: TaskId) -> Result<TaskInfo> {
        let info = self
            .lookup(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;

        if info.state.is_terminal() {
            tracing::debug!(task_id = %id, state = %info.state, "cancel of finished task ignored");
            return Ok(info);
        }

        if info.state == TaskState::Waiting {
            self.remove_from_queue(id).await;
            if self.db.cancel_waiting_task(id).await? {
                tracing::info!(task_id = %id, "waiting task canceled");
                self.emit_event(Event::TaskStateChanged {
                    id,
                    kind: info.kind,
                    state: TaskState::Canceled,
                });
                return self.current(id, info).await;
            }
            // It started meanwhile; fall through and signal it
        }

        let signalled = {
            let active = self.state.active.lock().await;
            match active.get(&id) {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            }
        };

        if signalled {
            tracing::info!(task_id = %id, "cancellation requested for running task");
        } else {
            tracing::debug!(task_id = %id, "no running worker for task, nothing to signal");
        }

        self.current(id, info).await
    }

    /// Signal every running task to stop
    pub(crate) async fn cancel_all_running(&self) {
        let active = self.state.active.lock().await;
        tracing::debug!(active_count = active.len(), "signalling all running tasks");
        for token in active.values() {
            token.cancel();
        }
    }

    async fn current(&self, id: TaskId, fallback: TaskInfo) -> Result<TaskInfo> {
        Ok(self.lookup(id).await?.unwrap_or(fallback))
    }
}
