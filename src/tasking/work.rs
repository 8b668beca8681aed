//! Units of work the scheduler executes.

use crate::error::{Error, Result};
use crate::types::{CreatedResource, ResourceKey, TaskId, TaskKind};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Work that runs as a tracked task
///
/// `run` returns the resources it created; they are recorded on the task only
/// if it finishes successfully. Returning [`Error::Canceled`] records the task
/// as Canceled, any other error records it as Failed.
#[async_trait]
pub trait TaskWork: Send + Sync + 'static {
    /// What kind of task this is
    fn kind(&self) -> TaskKind;

    /// Human-readable description stored on the task
    fn name(&self) -> String;

    /// Key under which execution is serialized
    fn resource_key(&self) -> ResourceKey;

    /// Do the work
    async fn run(&self, ctx: &TaskContext) -> Result<Vec<CreatedResource>>;
}

/// Per-execution handle given to [`TaskWork::run`]
#[derive(Clone, Debug)]
pub struct TaskContext {
    /// The task being executed
    pub id: TaskId,
    cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, cancel: CancellationToken) -> Self {
        Self { id, cancel }
    }

    /// Whether cancellation has been requested
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation checkpoint: `Err(Error::Canceled)` once cancellation was requested
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        Ok(())
    }

    /// Resolves when cancellation is requested
    pub async fn canceled(&self) {
        self.cancel.cancelled().await
    }

    /// Token for handing to blocking work
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
