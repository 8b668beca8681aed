//! Remote feed manifest parsing.
//!
//! A manifest is a text file with one content unit per line:
//!
//! ```text
//! # comment
//! docs/readme.txt,<sha256 hex>,1024
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Component, Path};

/// One content unit announced by a remote feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path of the unit relative to the manifest URL
    pub relative_path: String,
    /// Lowercase hex sha256 of the unit bytes
    pub sha256: String,
    /// Size of the unit in bytes
    pub size: u64,
}

/// Parse a manifest into entries, in file order
///
/// Rejects malformed lines, paths that escape the repository, and a path
/// listed twice with different content.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestEntry>> {
    let mut entries = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = index + 1;

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [relative_path, sha256, size] = fields.as_slice() else {
            return Err(manifest_error(
                line_no,
                format!("expected 3 fields, found {}", fields.len()),
            ));
        };

        validate_relative_path(relative_path).map_err(|reason| manifest_error(line_no, reason))?;

        let sha256 = sha256.to_ascii_lowercase();
        if sha256.len() != 64 || !sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(manifest_error(line_no, format!("invalid sha256 '{}'", sha256)));
        }

        let size: u64 = size
            .parse()
            .map_err(|_| manifest_error(line_no, format!("invalid size '{}'", size)))?;

        if let Some(previous) = seen.get(*relative_path) {
            if *previous != sha256 {
                return Err(manifest_error(
                    line_no,
                    format!("'{}' listed twice with different digests", relative_path),
                ));
            }
            continue;
        }
        seen.insert(relative_path.to_string(), sha256.clone());

        entries.push(ManifestEntry {
            relative_path: relative_path.to_string(),
            sha256,
            size,
        });
    }

    Ok(entries)
}

fn validate_relative_path(path: &str) -> std::result::Result<(), String> {
    if path.is_empty() {
        return Err("empty path".to_string());
    }
    if path.contains('\\') {
        return Err(format!("'{}' contains a backslash", path));
    }

    let parsed = Path::new(path);
    if parsed.is_absolute() {
        return Err(format!("'{}' is absolute", path));
    }
    for component in parsed.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => return Err(format!("'{}' contains '.'", path)),
            _ => return Err(format!("'{}' escapes the repository", path)),
        }
    }

    Ok(())
}

fn manifest_error(line: usize, reason: String) -> Error {
    Error::Feed(format!("manifest line {}: {}", line, reason))
}
