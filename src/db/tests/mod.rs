use crate::db::*;
use crate::types::{NewRemote, NewRepository};
use tempfile::NamedTempFile;

mod content;
mod state;

/// Open a fresh database in a temp file (keep the file alive for the test)
async fn open_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

/// Create a repository with one remote
async fn seed_repository(db: &Database, name: &str) {
    let repo = NewRepository::named(name).with_remote(NewRemote {
        url: format!("https://feeds.example/{}/manifest.csv", name),
        ca_cert: None,
        client_cert: None,
    });
    assert!(db.create_repository(&repo).await.unwrap());
}

fn unit(path: &str, sha: &str, size: i64) -> ContentUnit {
    ContentUnit {
        relative_path: path.to_string(),
        sha256: sha.to_string(),
        size,
    }
}
