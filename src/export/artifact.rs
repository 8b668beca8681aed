//! Zip artifact writing.
//!
//! Layout of an export artifact:
//!
//! ```text
//! metadata.json
//! repositories/<repository>/<relative_path>
//! ```
//!
//! These functions block and are run through `spawn_blocking`.

use crate::error::{Error, Result};
use crate::types::{ExporterId, TaskId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use zip::write::FileOptions;

/// Name of the metadata entry inside every artifact
pub const METADATA_ENTRY: &str = "metadata.json";

/// `metadata.json` contents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Exporter id
    pub exporter_id: ExporterId,
    /// Exporter name at export time
    pub exporter: String,
    /// Task that produced the artifact
    pub task_id: TaskId,
    /// RFC 3339 creation time
    pub created_at: String,
    /// One snapshot per exporter repository
    pub repositories: Vec<RepositorySnapshot>,
}

/// A repository version captured in an artifact
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    /// Repository name
    pub repository: String,
    /// Version number
    pub version: i64,
    /// Units in the version
    pub units: Vec<SnapshotUnit>,
}

/// One unit listed in the metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotUnit {
    /// Path relative to the repository
    pub relative_path: String,
    /// Hex sha256 of the content
    pub sha256: String,
    /// Size in bytes
    pub size: i64,
}

/// A file to place in the artifact
#[derive(Clone, Debug)]
pub struct ArtifactEntry {
    /// Path inside the zip
    pub name: String,
    /// Blob holding the bytes
    pub source: PathBuf,
}

impl ArtifactEntry {
    /// Entry for a repository unit
    pub fn unit(repository: &str, relative_path: &str, source: PathBuf) -> Self {
        Self {
            name: format!("repositories/{}/{}", repository, relative_path),
            source,
        }
    }
}

/// Write the artifact at `target` and return its hex sha256
///
/// The zip is written to `<target>.part` and renamed into place once complete,
/// so `target` never holds a partial archive. Returns [`Error::Canceled`]
/// (after removing the partial file) if `cancel` fires between entries.
pub fn write_artifact(
    target: &Path,
    metadata: &ExportMetadata,
    entries: &[ArtifactEntry],
    cancel: &CancellationToken,
) -> Result<String> {
    let partial = partial_path(target);

    let result = write_zip(&partial, metadata, entries, cancel)
        .and_then(|()| std::fs::rename(&partial, target).map_err(Error::from));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    file_sha256(target)
}

/// Hex sha256 of a file's contents
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn write_zip(
    path: &Path,
    metadata: &ExportMetadata,
    entries: &[ArtifactEntry],
    cancel: &CancellationToken,
) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    writer.start_file(METADATA_ENTRY, options)?;
    writer.write_all(&serde_json::to_vec_pretty(metadata)?)?;

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        let mut source = File::open(&entry.source)?;
        writer.start_file(entry.name.as_str(), options)?;
        std::io::copy(&mut source, &mut writer)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    Ok(())
}
