//! Error types for content-depot
//!
//! This module provides the error taxonomy used across the crate:
//! - Validation errors (bad input, reported immediately, never retried)
//! - Conflict errors (state-dependent illegal operations)
//! - Not-found errors (unknown ids)
//! - Infrastructure errors (database, I/O, network, archive)
//!
//! Errors raised while a Task executes are never returned to the submitter.
//! They are converted into a [`TaskError`](crate::types::TaskError) and stored
//! on the task record.

use crate::types::{ExportId, ExporterId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for content-depot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for content-depot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "allowed_export_paths")
        key: Option<String>,
    },

    /// Request input is invalid (duplicate name, disallowed path, unknown reference)
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable description of what is wrong
        message: String,
        /// The input field that failed validation, if known
        field: Option<String>,
    },

    /// Operation is illegal given the current state of the resource
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Task stopped at a checkpoint after cancellation was requested
    #[error("task canceled")]
    Canceled,

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while talking to a remote feed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote feed returned something we cannot use
    #[error("feed error: {0}")]
    Feed(String),

    /// Downloaded content does not match the digest announced by the feed
    #[error("checksum mismatch for {relative_path}: expected {expected}, got {actual}")]
    Checksum {
        /// Relative path of the unit inside the repository
        relative_path: String,
        /// Digest listed in the feed manifest
        expected: String,
        /// Digest of the bytes actually received
        actual: String,
    },

    /// Export archive could not be written
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a validation error tied to a specific input field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

/// State conflicts that make a request impossible right now
///
/// These surface to HTTP clients as server-side (500) failures so automated
/// clients can tell them apart from malformed requests.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// The export is the exporter's current `last_export`
    #[error("export {export_id} is the last export of exporter {exporter_id} and cannot be deleted")]
    LastExportProtected {
        /// Exporter owning the export
        exporter_id: ExporterId,
        /// The protected export
        export_id: ExportId,
    },

    /// The exporter still points at an export
    #[error(
        "exporter {exporter_id} still references export {export_id}; clear last_export before deleting"
    )]
    ExporterHasLastExport {
        /// The exporter that was asked to be deleted
        exporter_id: ExporterId,
        /// Its current `last_export`
        export_id: ExportId,
    },

    /// An export of the exporter is waiting or running
    #[error("exporter {exporter_id} has an export in progress; wait for it to finish")]
    ExportInProgress {
        /// The exporter that was asked to be deleted
        exporter_id: ExporterId,
    },
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "conflict",
///     "message": "conflict: export 7 is the last export of exporter 2 and cannot be deleted",
///     "details": {
///       "exporter_id": 2,
///       "export_id": 7
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Validation { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Database(DatabaseError::NotFound(_)) => 404,

            // 409 only reachable if a canceled task error leaks to a caller
            Error::Canceled => 409,

            // 500 Internal Server Error - state conflicts are deliberately server-side
            Error::Conflict(_) => 500,
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Archive(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - remote feed problems
            Error::Network(_) => 502,
            Error::Feed(_) => 502,
            Error::Checksum { .. } => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation { .. } => "validation_error",
            Error::Conflict(_) => "conflict",
            Error::NotFound(_) => "not_found",
            Error::Canceled => "canceled",
            Error::Database(DatabaseError::NotFound(_)) => "not_found",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Feed(_) => "feed_error",
            Error::Checksum { .. } => "checksum_mismatch",
            Error::Archive(_) => "archive_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({
                "field": field,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Conflict(ConflictError::LastExportProtected {
                exporter_id,
                export_id,
            })
            | Error::Conflict(ConflictError::ExporterHasLastExport {
                exporter_id,
                export_id,
            }) => Some(serde_json::json!({
                "exporter_id": exporter_id,
                "export_id": export_id,
            })),
            Error::Conflict(ConflictError::ExportInProgress { exporter_id }) => {
                Some(serde_json::json!({
                    "exporter_id": exporter_id,
                }))
            }
            Error::Checksum {
                relative_path,
                expected,
                actual,
            } => Some(serde_json::json!({
                "relative_path": relative_path,
                "expected": expected,
                "actual": actual,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

/// Path-related validation failure helper
pub(crate) fn invalid_path(path: &std::path::Path, reason: &str) -> Error {
    Error::validation("path", format!("{}: {}", path.display(), reason))
}
