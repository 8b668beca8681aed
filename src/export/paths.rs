//! Exporter target path validation.

use crate::error::{Result, invalid_path};
use std::path::{Component, Path, PathBuf};

/// Check that `path` is an acceptable exporter target
///
/// The path must be absolute, must not contain `..`, and must lie inside one
/// of `allowed`. An empty allowlist rejects every path. Returns the path with
/// `.` components removed.
pub fn validate_export_path(path: &Path, allowed: &[PathBuf]) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(invalid_path(path, "export path must be absolute"));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(invalid_path(path, "export path must not contain '..'"));
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    if allowed.is_empty() {
        return Err(invalid_path(path, "no export paths are allowed by configuration"));
    }

    let permitted = allowed
        .iter()
        .any(|root| normalized.starts_with(root) && normalized != *root);
    if !permitted {
        return Err(invalid_path(
            path,
            "export path is not inside an allowed export directory",
        ));
    }

    Ok(normalized)
}
