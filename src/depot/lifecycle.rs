//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::Depot;

impl Depot {
    /// Gracefully shut down the depot
    ///
    /// 1. Stops accepting new tasks and cancels queued ones
    /// 2. Signals running tasks and waits for them (bounded by `tasks.shutdown_timeout`)
    /// 3. Marks a clean shutdown in the database
    /// 4. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.scheduler.shutdown().await;

        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        } else {
            tracing::info!("Marked clean shutdown in database");
        }

        self.emit_event(Event::Shutdown);

        tracing::info!("Shutdown complete - database connections will close when the depot is dropped");
        Ok(())
    }
}
