//! Completion polling for batches of tasks.
//!
//! Callers that submitted several tasks (syncs, exports) wait for all of them
//! with [`await_all`]. Each round sleeps for the poll interval and then looks
//! every task up in order. A lookup that fails or finds nothing is logged and
//! retried next round, but never keeps the loop alive on its own: polling
//! ends once every task that could be found is terminal, or at the deadline.
//!
//! Dropping the returned future stops waiting; the tasks keep running.

use crate::depot::Depot;
use crate::error::Result;
use crate::types::{TaskId, TaskInfo};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Source of task snapshots
#[async_trait]
pub trait TaskLookup: Send + Sync {
    /// Current snapshot of a task, `None` if it is unknown
    async fn lookup_task(&self, id: TaskId) -> Result<Option<TaskInfo>>;
}

#[async_trait]
impl TaskLookup for Depot {
    async fn lookup_task(&self, id: TaskId) -> Result<Option<TaskInfo>> {
        Depot::lookup_task(self, id).await
    }
}

/// How [`await_all`] polls
#[derive(Clone, Debug)]
pub struct PollOptions {
    /// Sleep before each round (default: 5 seconds)
    pub interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

/// What polling learned about one task
#[derive(Clone, Debug)]
pub enum TaskOutcome {
    /// Reached a terminal state
    Finished(TaskInfo),
    /// Waiting or Running when last seen (deadline reached, or later lookups failed)
    Pending(TaskInfo),
    /// Never found
    Missing(TaskId),
}

impl TaskOutcome {
    /// Id of the task this outcome describes
    pub fn id(&self) -> TaskId {
        match self {
            TaskOutcome::Finished(info) | TaskOutcome::Pending(info) => info.id,
            TaskOutcome::Missing(id) => *id,
        }
    }

    /// Whether the task reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskOutcome::Finished(_))
    }
}

/// Poll until every task that can be found is terminal
///
/// Outcomes are returned in the order of `ids`.
pub async fn await_all<L>(lookup: &L, ids: &[TaskId], options: &PollOptions) -> Vec<TaskOutcome>
where
    L: TaskLookup + ?Sized,
{
    let deadline = options.timeout.map(|timeout| Instant::now() + timeout);
    let mut outcomes: Vec<TaskOutcome> = ids.iter().copied().map(TaskOutcome::Missing).collect();

    loop {
        tokio::time::sleep(options.interval).await;

        let mut incomplete = false;
        for outcome in outcomes.iter_mut() {
            if outcome.is_finished() {
                continue;
            }

            let id = outcome.id();
            match lookup.lookup_task(id).await {
                Ok(Some(info)) if info.state.is_terminal() => {
                    tracing::info!(task_id = %id, state = %info.state, "task finished");
                    *outcome = TaskOutcome::Finished(info);
                }
                Ok(Some(info)) => {
                    tracing::debug!(task_id = %id, state = %info.state, "task still active");
                    *outcome = TaskOutcome::Pending(info);
                    incomplete = true;
                }
                Ok(None) => {
                    tracing::warn!(task_id = %id, "task not found, skipping this round");
                }
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %e, "task lookup failed, skipping this round");
                }
            }
        }

        if !incomplete {
            return outcomes;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracing::warn!(
                pending = outcomes.iter().filter(|o| !o.is_finished()).count(),
                "gave up waiting for tasks"
            );
            return outcomes;
        }
    }
}
