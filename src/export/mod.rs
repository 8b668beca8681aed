//! Export engine: versioned, checksummed snapshot artifacts.
//!
//! - [`paths`] - Exporter target path validation
//! - [`artifact`] - Zip artifact layout and writing
//! - [`engine`] - [`ExportWork`], the task that writes and records one export

mod artifact;
mod engine;
mod paths;

pub use artifact::{
    ArtifactEntry, ExportMetadata, METADATA_ENTRY, RepositorySnapshot, SnapshotUnit,
    file_sha256, write_artifact,
};
pub use engine::ExportWork;
pub use paths::validate_export_path;
