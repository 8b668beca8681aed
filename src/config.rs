//! Configuration types for content-depot

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration for Depot
///
/// Fields are organized into sub-configs:
/// - [`storage`](StorageConfig) - database and blob locations
/// - [`export`](ExportConfig) - where export artifacts may be written
/// - [`tasks`](TaskConfig) - worker pool and dispatcher behavior
/// - [`sync`](SyncConfig) - remote feed fetching
/// - [`api`](ApiConfig) - REST server
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Database and content store locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Export path policy
    #[serde(default)]
    pub export: ExportConfig,

    /// Task execution settings
    #[serde(default)]
    pub tasks: TaskConfig,

    /// Remote feed fetching settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check settings that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if self.tasks.max_concurrent_tasks == 0 {
            return Err(Error::Config {
                message: "max_concurrent_tasks must be at least 1".to_string(),
                key: Some("tasks.max_concurrent_tasks".to_string()),
            });
        }

        if self.tasks.dispatch_interval.is_zero() {
            return Err(Error::Config {
                message: "dispatch_interval must be non-zero".to_string(),
                key: Some("tasks.dispatch_interval".to_string()),
            });
        }

        for allowed in &self.export.allowed_export_paths {
            if !allowed.is_absolute() {
                return Err(Error::Config {
                    message: format!(
                        "allowed export path '{}' must be absolute",
                        allowed.display()
                    ),
                    key: Some("export.allowed_export_paths".to_string()),
                });
            }
        }

        if self.sync.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be >= 1.0".to_string(),
                key: Some("sync.retry.backoff_multiplier".to_string()),
            });
        }

        Ok(())
    }
}

/// Database and content store locations
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Database path (default: "./content-depot.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Root directory of the content-addressable blob store (default: "./content")
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            content_dir: default_content_dir(),
        }
    }
}

/// Export path policy
///
/// An exporter path must be absolute, free of `..` components, and located
/// under one of `allowed_export_paths`. With an empty list no exporter can be
/// created.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ExportConfig {
    /// Directories under which exporter paths may live
    #[serde(default)]
    pub allowed_export_paths: Vec<PathBuf>,
}

/// Task execution settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskConfig {
    /// Maximum tasks running at once (default: 4)
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Fallback interval at which the dispatcher rescans the queue (default: 500ms)
    #[serde(default = "default_dispatch_interval", with = "duration_millis_serde")]
    pub dispatch_interval: Duration,

    /// How long shutdown waits for running tasks to stop (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            dispatch_interval: default_dispatch_interval(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Remote feed fetching settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncConfig {
    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent to feeds
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retry policy for transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:24817)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("content-depot.db")
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_max_concurrent_tasks() -> usize {
    4
}

fn default_dispatch_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    format!("content-depot/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 24817))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert_eq!(config.tasks.max_concurrent_tasks, 4);
        assert_eq!(config.tasks.dispatch_interval, Duration::from_millis(500));
        assert_eq!(config.sync.retry.max_attempts, 5);
        assert!(config.export.allowed_export_paths.is_empty());
        assert_eq!(config.storage.database_path, PathBuf::from("content-depot.db"));
        assert!(config.api.cors_enabled);
    }

    #[test]
    fn durations_serialize_in_their_units() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["tasks"]["dispatch_interval"], 500);
        assert_eq!(json["tasks"]["shutdown_timeout"], 30);
        assert_eq!(json["sync"]["request_timeout"], 60);
        assert_eq!(json["sync"]["retry"]["initial_delay"], 1);
    }

    #[test]
    fn nested_sections_deserialize() {
        let json = r#"{
            "export": {"allowed_export_paths": ["/srv/exports"]},
            "tasks": {"max_concurrent_tasks": 2, "dispatch_interval": 50},
            "sync": {"retry": {"max_attempts": 1, "jitter": false}}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.export.allowed_export_paths,
            vec![PathBuf::from("/srv/exports")]
        );
        assert_eq!(config.tasks.max_concurrent_tasks, 2);
        assert_eq!(config.tasks.dispatch_interval, Duration::from_millis(50));
        assert_eq!(config.sync.retry.max_attempts, 1);
        assert!(!config.sync.retry.jitter);
        assert_eq!(config.sync.retry.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.tasks.max_concurrent_tasks = 0;

        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, Error::Config { ref key, .. } if key.as_deref() == Some("tasks.max_concurrent_tasks")),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn relative_allowed_export_path_is_rejected() {
        let mut config = Config::default();
        config.export.allowed_export_paths = vec![PathBuf::from("exports")];

        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn shrinking_backoff_is_rejected() {
        let mut config = Config::default();
        config.sync.retry.backoff_multiplier = 0.5;

        assert!(config.validate().is_err());
    }
}
