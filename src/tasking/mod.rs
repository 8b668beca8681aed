//! Task scheduler and executor split into focused submodules.
//!
//! - [`work`] - The [`TaskWork`] trait implemented by sync and export, and the
//!   per-task [`TaskContext`]
//! - [`queue`] - Submission, lookup, and the FIFO wait queue
//! - [`dispatcher`] - Picks runnable tasks and hands them to workers
//! - [`runner`] - Executes one task and records its terminal state
//! - [`control`] - Cancellation
//! - [`lifecycle`] - Startup recovery and graceful shutdown
//!
//! Every task carries a resource key. At most one task per key runs at a time,
//! and tasks sharing a key start in submission order. Tasks with different keys
//! run in parallel up to `tasks.max_concurrent_tasks`.

mod control;
mod dispatcher;
mod lifecycle;
mod queue;
mod runner;
mod work;


pub use lifecycle::WORKER_LOST;
pub use work::{TaskContext, TaskWork};

use crate::config::TaskConfig;
use crate::db::Database;
use crate::types::{Event, ResourceKey, TaskId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, Notify, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// A submitted task waiting for a worker
pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    pub(crate) resource_key: ResourceKey,
    pub(crate) work: Box<dyn TaskWork>,
}

/// Wait queue plus the keys of tasks currently running
#[derive(Default)]
pub(crate) struct WaitQueue {
    /// Waiting tasks in submission order
    pub(crate) waiting: VecDeque<QueuedTask>,
    /// Resource keys held by running tasks
    pub(crate) reserved: HashSet<ResourceKey>,
}

/// Queue and worker state shared by every clone of the scheduler
#[derive(Clone)]
pub(crate) struct SchedulerState {
    /// FIFO wait queue and key reservations (one lock for both)
    pub(crate) queue: Arc<Mutex<WaitQueue>>,
    /// Limits concurrently running tasks
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Cancellation tokens of running tasks
    pub(crate) active: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
    /// Cleared during shutdown; submissions are rejected afterwards
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Wakes the dispatcher on submit and on task completion
    pub(crate) wakeup: Arc<Notify>,
    /// Stops the dispatcher loop
    pub(crate) stop: CancellationToken,
}

/// Scheduler/executor for tracked tasks (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct TaskScheduler {
    pub(crate) db: Arc<Database>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) config: TaskConfig,
    pub(crate) state: SchedulerState,
}

impl TaskScheduler {
    /// Create a scheduler over the given task store
    ///
    /// Nothing runs until [`start_dispatcher`](Self::start_dispatcher) is called.
    pub fn new(db: Arc<Database>, event_tx: broadcast::Sender<Event>, config: TaskConfig) -> Self {
        let state = SchedulerState {
            queue: Arc::new(Mutex::new(WaitQueue::default())),
            concurrent_limit: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
            active: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            wakeup: Arc::new(Notify::new()),
            stop: CancellationToken::new(),
        };

        Self {
            db,
            event_tx,
            config,
            state,
        }
    }

    /// Emit an event to all subscribers (dropped if nobody listens)
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
