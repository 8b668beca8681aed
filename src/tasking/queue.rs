//! Task submission, lookup, and the FIFO wait queue.

use crate::db::NewTask;
use crate::error::{DatabaseError, Error, Result};
use crate::types::{Event, TaskId, TaskInfo, TaskState};
use std::sync::atomic::Ordering;

use super::{QueuedTask, TaskScheduler, TaskWork};

impl TaskScheduler {
    /// Submit work as a new task
    ///
    /// Creates a Waiting task, enqueues it, and returns its snapshot without
    /// waiting for execution. Execution failures are recorded on the task and
    /// never returned from here.
    pub async fn submit<W: TaskWork>(&self, work: W) -> Result<TaskInfo> {
        self.ensure_accepting()?;

        let new_task = Self::new_task(&work);
        let id = self.db.insert_task(&new_task).await?;
        self.enqueue(id, Box::new(work)).await;

        self.snapshot(id).await
    }

    /// Submit work unless a Waiting or Running task holds the same resource key
    ///
    /// Returns `Ok(None)` when another task already holds the key.
    pub async fn submit_exclusive<W: TaskWork>(&self, work: W) -> Result<Option<TaskInfo>> {
        self.ensure_accepting()?;

        let new_task = Self::new_task(&work);
        let Some(id) = self.db.insert_task_exclusive(&new_task).await? else {
            tracing::debug!(
                resource_key = %new_task.resource_key,
                "active task already holds resource key, not submitting"
            );
            return Ok(None);
        };
        self.enqueue(id, Box::new(work)).await;

        self.snapshot(id).await.map(Some)
    }

    /// Current snapshot of a task, `None` if unknown
    pub async fn lookup(&self, id: TaskId) -> Result<Option<TaskInfo>> {
        match self.db.get_task(id).await? {
            Some(row) => Ok(Some(row.into_info()?)),
            None => Ok(None),
        }
    }

    /// All tasks in submission order, optionally filtered by state
    pub async fn list(&self, state: Option<TaskState>) -> Result<Vec<TaskInfo>> {
        self.db
            .list_tasks(state)
            .await?
            .into_iter()
            .map(|row| row.into_info())
            .collect()
    }

    /// Number of tasks waiting for a worker
    pub async fn queued_count(&self) -> usize {
        self.state.queue.lock().await.waiting.len()
    }

    /// Number of tasks currently executing
    pub async fn running_count(&self) -> usize {
        self.state.active.lock().await.len()
    }

    fn ensure_accepting(&self) -> Result<()> {
        if !self.state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    fn new_task<W: TaskWork>(work: &W) -> NewTask {
        NewTask {
            kind: work.kind(),
            name: work.name(),
            resource_key: work.resource_key().0,
        }
    }

    async fn enqueue(&self, id: TaskId, work: Box<dyn TaskWork>) {
        let kind = work.kind();
        let resource_key = work.resource_key();
        tracing::info!(task_id = %id, ?kind, %resource_key, "task submitted");

        {
            let mut queue = self.state.queue.lock().await;
            queue.waiting.push_back(QueuedTask {
                id,
                resource_key,
                work,
            });
        }

        self.emit_event(Event::TaskStateChanged {
            id,
            kind,
            state: TaskState::Waiting,
        });
        self.state.wakeup.notify_one();
    }

    /// Remove a task from the wait queue, returning whether it was there
    pub(crate) async fn remove_from_queue(&self, id: TaskId) -> bool {
        let mut queue = self.state.queue.lock().await;
        let before = queue.waiting.len();
        queue.waiting.retain(|task| task.id != id);
        queue.waiting.len() != before
    }

    async fn snapshot(&self, id: TaskId) -> Result<TaskInfo> {
        self.lookup(id).await?.ok_or_else(|| {
            Error::Database(DatabaseError::NotFound(format!(
                "task {} vanished after insert",
                id
            )))
        })
    }
}
