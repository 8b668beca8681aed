//! Startup recovery and graceful shutdown.

use crate::error::Result;
use crate::types::{Event, TaskError, TaskState};
use std::sync::atomic::Ordering;

use super::TaskScheduler;

/// Error code recorded on tasks interrupted by a restart
pub const WORKER_LOST: &str = "worker_lost";

impl TaskScheduler {
    /// Fail tasks left Waiting or Running by a previous process
    ///
    /// Their work died with that process and cannot be resumed, so they are
    /// marked Failed with code `worker_lost`. Must run before the dispatcher
    /// starts.
    pub async fn recover_orphaned_tasks(&self) -> Result<u64> {
        let unclean = self.db.was_unclean_shutdown().await?;

        let error = TaskError {
            code: WORKER_LOST.to_string(),
            message: "task was interrupted when the previous process stopped".to_string(),
        };
        let recovered = self.db.fail_orphaned_tasks(&error).await?;

        if recovered > 0 {
            tracing::warn!(recovered, unclean, "marked orphaned tasks as failed");
        } else if unclean {
            tracing::debug!("previous shutdown was unclean but no tasks were left behind");
        }

        Ok(recovered)
    }

    /// Gracefully stop the scheduler
    ///
    /// 1. Stops accepting new submissions
    /// 2. Stops the dispatcher and cancels everything still waiting
    /// 3. Signals running tasks and waits up to `tasks.shutdown_timeout`
    pub async fn shutdown(&self) {
        tracing::info!("shutting down task scheduler");
        self.state.accepting_new.store(false, Ordering::SeqCst);
        self.state.stop.cancel();

        let waiting: Vec<_> = {
            let mut queue = self.state.queue.lock().await;
            queue.waiting.drain(..).collect()
        };
        for task in waiting {
            match self.db.mark_task_canceled(task.id).await {
                Ok(true) => self.emit_event(Event::TaskStateChanged {
                    id: task.id,
                    kind: task.work.kind(),
                    state: TaskState::Canceled,
                }),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(task_id = %task.id, error = %e, "failed to cancel queued task");
                }
            }
        }

        self.cancel_all_running().await;

        let wait = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_running());
        match wait.await {
            Ok(()) => tracing::info!("all running tasks stopped"),
            Err(_) => tracing::warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "timeout waiting for running tasks, proceeding with shutdown"
            ),
        }
    }

    async fn wait_for_running(&self) {
        loop {
            let running = self.running_count().await;
            if running == 0 {
                return;
            }
            tracing::debug!(running, "waiting for running tasks to stop");
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}
