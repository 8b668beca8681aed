//! Dispatcher: picks runnable tasks from the wait queue and hands them to workers.

use std::collections::HashSet;
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

use super::{QueuedTask, TaskScheduler, WaitQueue};
use crate::types::ResourceKey;

impl TaskScheduler {
    /// Start the dispatcher task
    ///
    /// The dispatcher wakes on every submission and task completion (and at
    /// `tasks.dispatch_interval` as a fallback), then starts as many runnable
    /// tasks as there are free worker slots. It exits when the scheduler shuts
    /// down.
    pub fn start_dispatcher(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();

        tokio::spawn(async move {
            tracing::debug!(
                max_concurrent_tasks = scheduler.config.max_concurrent_tasks,
                "task dispatcher started"
            );
            loop {
                tokio::select! {
                    _ = scheduler.state.stop.cancelled() => break,
                    _ = scheduler.state.wakeup.notified() => {}
                    _ = tokio::time::sleep(scheduler.config.dispatch_interval) => {}
                }
                scheduler.dispatch_ready().await;
            }
            tracing::debug!("task dispatcher stopped");
        })
    }

    /// Start every runnable task for which a worker slot is free
    pub(crate) async fn dispatch_ready(&self) {
        loop {
            let Ok(permit) = self.state.concurrent_limit.clone().try_acquire_owned() else {
                return;
            };

            let next = {
                let mut queue = self.state.queue.lock().await;
                take_runnable(&mut queue)
            };

            match next {
                Some(task) => self.spawn_task(task, permit).await,
                None => return,
            }
        }
    }

    async fn spawn_task(&self, task: QueuedTask, permit: OwnedSemaphorePermit) {
        let token = CancellationToken::new();
        {
            let mut active = self.state.active.lock().await;
            active.insert(task.id, token.clone());
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            let id = task.id;
            let resource_key = task.resource_key.clone();

            scheduler.run_task(task, token).await;

            scheduler.state.active.lock().await.remove(&id);
            scheduler.state.queue.lock().await.reserved.remove(&resource_key);
            drop(permit);
            scheduler.state.wakeup.notify_one();
        });
    }
}

/// Remove and return the first waiting task whose key is free
///
/// A task is runnable when no running task holds its key and no earlier
/// waiting task shares its key. The chosen key is reserved before returning.
fn take_runnable(queue: &mut WaitQueue) -> Option<QueuedTask> {
    let chosen = {
        let mut blocked: HashSet<&ResourceKey> = HashSet::new();
        queue.waiting.iter().position(|task| {
            let runnable = !queue.reserved.contains(&task.resource_key)
                && !blocked.contains(&task.resource_key);
            if !runnable {
                blocked.insert(&task.resource_key);
            }
            runnable
        })
    };

    let task = queue.waiting.remove(chosen?)?;
    queue.reserved.insert(task.resource_key.clone());
    Some(task)
}
