//! Content-addressable blob store
//!
//! Blobs live under `<root>/<first two hex chars>/<full sha256>`. Writes go to
//! a temporary file in `<root>/.tmp` and are renamed into place, so a blob path
//! either does not exist or holds complete content.

use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Hex sha256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Local content-addressable blob store
#[derive(Clone, Debug)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the blob with this digest lives (whether or not it exists)
    pub fn blob_path(&self, sha256: &str) -> PathBuf {
        let prefix = sha256.get(..2).unwrap_or("00");
        self.root.join(prefix).join(sha256)
    }

    /// Whether a blob with this digest is stored
    pub async fn contains(&self, sha256: &str) -> bool {
        tokio::fs::try_exists(self.blob_path(sha256))
            .await
            .unwrap_or(false)
    }

    /// Store bytes and return their digest
    ///
    /// Storing content that is already present is a no-op.
    pub async fn put(&self, bytes: &[u8]) -> Result<String> {
        let digest = sha256_hex(bytes);
        let target = self.blob_path(&digest);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(digest);
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self
            .root
            .join(".tmp")
            .join(format!("{}.{:016x}", digest, rand::random::<u64>()));
        tokio::fs::write(&temp, bytes).await?;

        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        tracing::debug!(sha256 = %digest, size = bytes.len(), "stored blob");
        Ok(digest)
    }

    /// Read a blob fully
    pub async fn read(&self, sha256: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.blob_path(sha256)).await?)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sha256_hex_matches_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn put_stores_under_digest() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();

        let digest = store.put(b"hello").await.unwrap();
        assert_eq!(digest, sha256_hex(b"hello"));
        assert!(store.contains(&digest).await);

        let path = store.blob_path(&digest);
        assert!(path.starts_with(dir.path().join(&digest[..2])));
        assert_eq!(store.read(&digest).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();

        let first = store.put(b"same").await.unwrap();
        let second = store.put(b"same").await.unwrap();
        assert_eq!(first, second);

        // No temp files left behind
        let leftovers = std::fs::read_dir(dir.path().join(".tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn missing_blob_is_not_contained() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();

        assert!(!store.contains(&sha256_hex(b"never stored")).await);
        assert!(store.read("ffff").await.is_err());
    }
}
