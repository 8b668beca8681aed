//! Task records and conditional state transitions.
//!
//! Every transition names the states it may start from, so a terminal task is
//! never moved again no matter how calls interleave.

use crate::Result;
use crate::types::{CreatedResource, TaskError, TaskId, TaskState};

use super::{Database, NewTask, TaskRow, query_failed};

const TASK_COLUMNS: &str = r#"
    id, kind, name, resource_key, state, created_resources,
    error_code, error_message, created_at, started_at, finished_at
"#;

/// SQL list of state codes, e.g. `(0, 1)`
fn state_list(states: &[TaskState]) -> String {
    let codes: Vec<String> = states.iter().map(|s| s.to_i32().to_string()).collect();
    format!("({})", codes.join(", "))
}

/// States a task can be moved out of
const ACTIVE: [TaskState; 2] = [TaskState::Waiting, TaskState::Running];

impl Database {
    /// Insert a new Waiting task
    pub async fn insert_task(&self, task: &NewTask) -> Result<TaskId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (kind, name, resource_key, state, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.kind.to_i32())
        .bind(&task.name)
        .bind(&task.resource_key)
        .bind(TaskState::Waiting.to_i32())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to insert task"))?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Insert a new Waiting task unless an active task holds the same resource key
    ///
    /// The existence check and the insert are one statement, so two concurrent
    /// callers can never both succeed.
    pub async fn insert_task_exclusive(&self, task: &NewTask) -> Result<Option<TaskId>> {
        let now = chrono::Utc::now().timestamp();

        let sql = format!(
            r#"
            INSERT INTO tasks (kind, name, resource_key, state, created_at)
            SELECT ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM tasks WHERE resource_key = ? AND state IN {}
            )
            "#,
            state_list(&ACTIVE)
        );

        let result = sqlx::query(&sql)
            .bind(task.kind.to_i32())
            .bind(&task.name)
            .bind(&task.resource_key)
            .bind(TaskState::Waiting.to_i32())
            .bind(now)
            .bind(&task.resource_key)
            .execute(&self.pool)
            .await
            .map_err(query_failed("Failed to insert exclusive task"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(TaskId(result.last_insert_rowid())))
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<TaskRow>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("Failed to get task"))?;

        Ok(row)
    }

    /// List tasks in submission order, optionally filtered by state
    pub async fn list_tasks(&self, state: Option<TaskState>) -> Result<Vec<TaskRow>> {
        let rows = match state {
            Some(state) => {
                let sql = format!(
                    "SELECT {} FROM tasks WHERE state = ? ORDER BY id ASC",
                    TASK_COLUMNS
                );
                sqlx::query_as::<_, TaskRow>(&sql)
                    .bind(state.to_i32())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {} FROM tasks ORDER BY id ASC", TASK_COLUMNS);
                sqlx::query_as::<_, TaskRow>(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(query_failed("Failed to list tasks"))?;

        Ok(rows)
    }

    /// Move a Waiting task to Running
    ///
    /// Returns false if the task was no longer Waiting (e.g. canceled meanwhile).
    pub async fn mark_task_running(&self, id: TaskId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE tasks SET state = ?, started_at = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(TaskState::Running.to_i32())
        .bind(now)
        .bind(id)
        .bind(TaskState::Waiting.to_i32())
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to mark task running"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a Running task to Succeeded and record what it created
    pub async fn mark_task_succeeded(
        &self,
        id: TaskId,
        created_resources: &[CreatedResource],
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let resources = serde_json::to_string(created_resources)?;

        let result = sqlx::query(
            r#"
            UPDATE tasks SET state = ?, created_resources = ?, finished_at = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(TaskState::Succeeded.to_i32())
        .bind(resources)
        .bind(now)
        .bind(id)
        .bind(TaskState::Running.to_i32())
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to mark task succeeded"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a Waiting or Running task to Failed
    pub async fn mark_task_failed(&self, id: TaskId, error: &TaskError) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let sql = format!(
            r#"
            UPDATE tasks SET state = ?, error_code = ?, error_message = ?, finished_at = ?
            WHERE id = ? AND state IN {}
            "#,
            state_list(&ACTIVE)
        );

        let result = sqlx::query(&sql)
            .bind(TaskState::Failed.to_i32())
            .bind(&error.code)
            .bind(&error.message)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("Failed to mark task failed"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a Waiting or Running task to Canceled
    pub async fn mark_task_canceled(&self, id: TaskId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let sql = format!(
            "UPDATE tasks SET state = ?, finished_at = ? WHERE id = ? AND state IN {}",
            state_list(&ACTIVE)
        );

        let result = sqlx::query(&sql)
            .bind(TaskState::Canceled.to_i32())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("Failed to mark task canceled"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancel a task only if it is still Waiting
    pub async fn cancel_waiting_task(&self, id: TaskId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE tasks SET state = ?, finished_at = ? WHERE id = ? AND state = ?",
        )
        .bind(TaskState::Canceled.to_i32())
        .bind(now)
        .bind(id)
        .bind(TaskState::Waiting.to_i32())
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to cancel waiting task"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether a Waiting or Running task holds the given resource key
    pub async fn has_active_task(&self, resource_key: &str) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE resource_key = ? AND state IN {})",
            state_list(&ACTIVE)
        );

        let exists: bool = sqlx::query_scalar(&sql)
            .bind(resource_key)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("Failed to check active tasks"))?;

        Ok(exists)
    }

    /// Fail every task left Waiting or Running by a previous process
    ///
    /// Returns the number of tasks marked failed.
    pub async fn fail_orphaned_tasks(&self, error: &TaskError) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();

        let sql = format!(
            r#"
            UPDATE tasks SET state = ?, error_code = ?, error_message = ?, finished_at = ?
            WHERE state IN {}
            "#,
            state_list(&ACTIVE)
        );

        let result = sqlx::query(&sql)
            .bind(TaskState::Failed.to_i32())
            .bind(&error.code)
            .bind(&error.message)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(query_failed("Failed to recover orphaned tasks"))?;

        Ok(result.rows_affected())
    }
}
