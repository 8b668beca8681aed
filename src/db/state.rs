//! Runtime state tracking: shutdown detection.

use crate::Result;

use super::{Database, query_failed};

impl Database {
    /// Check if the last shutdown was unclean
    ///
    /// Returns true if the previous session did not call `set_clean_shutdown()`,
    /// indicating a crash or forced termination. A fresh database reports an
    /// unclean shutdown too, which is harmless: there is nothing to recover.
    pub async fn was_unclean_shutdown(&self) -> Result<bool> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM runtime_state WHERE key = 'clean_shutdown'
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to check shutdown state"))?;

        Ok(value.is_none_or(|v| v != "true"))
    }

    /// Mark that the depot has started
    ///
    /// If `set_clean_shutdown()` is not called before the next startup,
    /// `was_unclean_shutdown()` will return true.
    pub async fn set_clean_start(&self) -> Result<()> {
        self.set_runtime_flag("clean_shutdown", "false").await
    }

    /// Mark that the depot is shutting down cleanly
    pub async fn set_clean_shutdown(&self) -> Result<()> {
        self.set_runtime_flag("clean_shutdown", "true").await
    }

    async fn set_runtime_flag(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to update runtime state"))?;

        Ok(())
    }
}
