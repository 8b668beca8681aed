//! Executes one task and records its terminal state.

use crate::error::Error;
use crate::types::{Event, TaskError, TaskId, TaskKind, TaskState};
use tokio_util::sync::CancellationToken;

use super::{QueuedTask, TaskContext, TaskScheduler};

/// How a task's work ended
enum Outcome {
    Succeeded(Vec<crate::types::CreatedResource>),
    Failed(TaskError),
    Canceled,
}

impl TaskScheduler {
    /// Run a dispatched task to completion
    ///
    /// The work runs in its own spawned future so a panic is captured and
    /// recorded as a failure instead of taking the worker down.
    pub(crate) async fn run_task(&self, task: QueuedTask, token: CancellationToken) {
        let id = task.id;
        let kind = task.work.kind();

        match self.db.mark_task_running(id).await {
            Ok(true) => {}
            Ok(false) => {
                // Canceled while it was being dispatched
                tracing::debug!(task_id = %id, "task no longer waiting, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(task_id = %id, error = %e, "failed to mark task running");
                return;
            }
        }

        tracing::info!(task_id = %id, ?kind, "task started");
        self.emit_event(Event::TaskStateChanged {
            id,
            kind,
            state: TaskState::Running,
        });

        let ctx = TaskContext::new(id, token);
        let work = task.work;
        let handle = tokio::spawn(async move { work.run(&ctx).await });

        let outcome = match handle.await {
            Ok(Ok(resources)) => Outcome::Succeeded(resources),
            Ok(Err(Error::Canceled)) => Outcome::Canceled,
            Ok(Err(e)) => Outcome::Failed(TaskError::from(&e)),
            Err(join_error) if join_error.is_panic() => {
                let payload = join_error.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Outcome::Failed(TaskError {
                    code: "panic".to_string(),
                    message: format!("task panicked: {}", message),
                })
            }
            Err(_) => Outcome::Canceled,
        };

        self.record_outcome(id, kind, outcome).await;
    }

    async fn record_outcome(&self, id: TaskId, kind: TaskKind, outcome: Outcome) {
        let (state, result) = match outcome {
            Outcome::Succeeded(resources) => {
                let result = self.db.mark_task_succeeded(id, &resources).await;
                if result.is_ok() {
                    tracing::info!(task_id = %id, created = resources.len(), "task succeeded");
                }
                (TaskState::Succeeded, result)
            }
            Outcome::Failed(error) => {
                tracing::error!(task_id = %id, code = %error.code, error = %error.message, "task failed");
                (TaskState::Failed, self.db.mark_task_failed(id, &error).await)
            }
            Outcome::Canceled => {
                tracing::info!(task_id = %id, "task canceled");
                (TaskState::Canceled, self.db.mark_task_canceled(id).await)
            }
        };

        match result {
            Ok(true) => self.emit_event(Event::TaskStateChanged { id, kind, state }),
            Ok(false) => {
                tracing::warn!(task_id = %id, %state, "task left Running before its outcome was recorded");
            }
            Err(e) => {
                tracing::error!(task_id = %id, error = %e, "failed to record task outcome");
            }
        }
    }
}
