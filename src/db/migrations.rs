//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

/// One schema step: a label for error messages and the statement to run
type Step = (&'static str, &'static str);

/// v1: task records and runtime state
const V1_TASKS: &[Step] = &[
    (
        "tasks table",
        r#"
        CREATE TABLE tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind INTEGER NOT NULL,
            name TEXT NOT NULL,
            resource_key TEXT NOT NULL,
            state INTEGER NOT NULL DEFAULT 0,
            created_resources TEXT NOT NULL DEFAULT '[]',
            error_code TEXT,
            error_message TEXT,
            created_at INTEGER NOT NULL,
            started_at INTEGER,
            finished_at INTEGER
        )
        "#,
    ),
    (
        "tasks state index",
        "CREATE INDEX idx_tasks_state ON tasks(state)",
    ),
    (
        "tasks resource key index",
        "CREATE INDEX idx_tasks_resource_key ON tasks(resource_key, state)",
    ),
    (
        "runtime_state table",
        r#"
        CREATE TABLE runtime_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    ),
];

/// v2: repositories, remotes, and versioned content
const V2_REPOSITORIES: &[Step] = &[
    (
        "repositories table",
        r#"
        CREATE TABLE repositories (
            name TEXT PRIMARY KEY,
            description TEXT,
            latest_version INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "remotes table",
        r#"
        CREATE TABLE remotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repository TEXT NOT NULL REFERENCES repositories(name) ON DELETE CASCADE,
            url TEXT NOT NULL,
            ca_cert TEXT,
            client_cert TEXT
        )
        "#,
    ),
    (
        "content_units table",
        r#"
        CREATE TABLE content_units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            relative_path TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            size INTEGER NOT NULL,
            UNIQUE(relative_path, sha256)
        )
        "#,
    ),
    (
        "repository_versions table",
        r#"
        CREATE TABLE repository_versions (
            repository TEXT NOT NULL REFERENCES repositories(name) ON DELETE CASCADE,
            number INTEGER NOT NULL,
            task_id INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (repository, number)
        )
        "#,
    ),
    (
        "repository_version_content table",
        r#"
        CREATE TABLE repository_version_content (
            repository TEXT NOT NULL,
            number INTEGER NOT NULL,
            unit_id INTEGER NOT NULL REFERENCES content_units(id),
            PRIMARY KEY (repository, number, unit_id),
            FOREIGN KEY (repository, number)
                REFERENCES repository_versions(repository, number) ON DELETE CASCADE
        )
        "#,
    ),
];

/// v3: exporters and exports
///
/// `exporters.last_export_id` references `exports` with RESTRICT so the
/// protected export cannot be removed even by a stray statement.
const V3_EXPORTS: &[Step] = &[
    (
        "exporters table",
        r#"
        CREATE TABLE exporters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            path TEXT NOT NULL,
            last_export_id INTEGER REFERENCES exports(id) ON DELETE RESTRICT,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "exporter_repositories table",
        r#"
        CREATE TABLE exporter_repositories (
            exporter_id INTEGER NOT NULL REFERENCES exporters(id) ON DELETE CASCADE,
            repository TEXT NOT NULL REFERENCES repositories(name),
            position INTEGER NOT NULL,
            PRIMARY KEY (exporter_id, repository)
        )
        "#,
    ),
    (
        "exports table",
        r#"
        CREATE TABLE exports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            exporter_id INTEGER NOT NULL REFERENCES exporters(id) ON DELETE CASCADE,
            task_id INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
            filename TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "exports exporter index",
        "CREATE INDEX idx_exports_exporter ON exports(exporter_id, id)",
    ),
    (
        "export_resources table",
        r#"
        CREATE TABLE export_resources (
            export_id INTEGER NOT NULL REFERENCES exports(id) ON DELETE CASCADE,
            repository TEXT NOT NULL,
            version INTEGER NOT NULL,
            PRIMARY KEY (export_id, repository)
        )
        "#,
    ),
];

/// All migrations in application order; index + 1 is the schema version
const MIGRATIONS: &[&[Step]] = &[V1_TASKS, V2_REPOSITORIES, V3_EXPORTS];

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Connect to database with foreign key enforcement and WAL mode
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };

        // Run migrations
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        // Create schema version table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        // Check current version
        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        for (index, steps) in MIGRATIONS.iter().enumerate() {
            let version = index as i64 + 1;
            if current_version < version {
                Self::apply_migration(&mut conn, version, steps).await?;
            }
        }

        Ok(())
    }

    /// Apply one migration inside a transaction
    async fn apply_migration(conn: &mut SqliteConnection, version: i64, steps: &[Step]) -> Result<()> {
        tracing::info!("Applying database migration v{}", version);

        // Wrap migration in a transaction so partial failures don't leave the DB in a broken state
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            for (label, sql) in steps {
                sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
                    Error::Database(DatabaseError::MigrationFailed(format!(
                        "Failed to create {}: {}",
                        label, e
                    )))
                })?;
            }
            Self::record_migration(conn, version).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v{}: {}",
                            version, e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Database migration v{} complete", version);
        Ok(())
    }

    /// Record a migration version as applied
    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
