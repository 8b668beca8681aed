use super::*;
use crate::config::{RetryConfig, SyncConfig};
use crate::db::{ContentUnit, Database};
use crate::depot::test_helpers::MemoryFeed;
use crate::error::{Error, Result};
use crate::storage::{ContentStore, sha256_hex};
use crate::tasking::{TaskContext, TaskWork};
use crate::types::{
    CreatedResource, Event, NewRemote, NewRepository, SyncOptions, TaskId,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

struct Fixture {
    db: Arc<Database>,
    store: ContentStore,
    feed: Arc<MemoryFeed>,
    event_tx: broadcast::Sender<Event>,
    _temp_dir: TempDir,
}

const BASE: &str = "https://feeds.example/zoo";

async fn fixture(remote_urls: &[&str]) -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
    let store = ContentStore::open(temp_dir.path().join("content")).await.unwrap();

    let mut repo = NewRepository::named("zoo");
    for url in remote_urls {
        repo = repo.with_remote(NewRemote {
            url: url.to_string(),
            ca_cert: None,
            client_cert: None,
        });
    }
    db.create_repository(&repo).await.unwrap();

    let (event_tx, _) = broadcast::channel(100);
    Fixture {
        db: Arc::new(db),
        store,
        feed: Arc::new(MemoryFeed::default()),
        event_tx,
        _temp_dir: temp_dir,
    }
}

impl Fixture {
    fn work(&self, options: SyncOptions) -> SyncWork {
        SyncWork::new(
            self.db.clone(),
            self.store.clone(),
            self.feed.clone(),
            self.event_tx.clone(),
            "zoo",
            options,
        )
    }

    async fn sync(&self, options: SyncOptions) -> Result<Vec<CreatedResource>> {
        let ctx = TaskContext::new(TaskId(1), CancellationToken::new());
        self.work(options).run(&ctx).await
    }

    async fn latest(&self) -> i64 {
        self.db.get_repository("zoo").await.unwrap().unwrap().latest_version
    }

    async fn paths(&self, version: i64) -> Vec<String> {
        self.db
            .version_content("zoo", version)
            .await
            .unwrap()
            .into_iter()
            .map(|u: ContentUnit| u.relative_path)
            .collect()
    }
}

fn manifest_url(base: &str) -> String {
    format!("{}/manifest.csv", base)
}

#[tokio::test]
async fn test_first_sync_creates_version_one() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    fx.feed.publish(BASE, &[("lion.txt", "roar"), ("birds/owl.txt", "hoot")]);
    let mut events = fx.event_tx.subscribe();

    let created = fx.sync(SyncOptions::default()).await.unwrap();

    assert_eq!(
        created,
        vec![CreatedResource::RepositoryVersion {
            repository: "zoo".to_string(),
            number: 1
        }]
    );
    assert_eq!(fx.latest().await, 1);
    assert_eq!(fx.paths(1).await, vec!["birds/owl.txt", "lion.txt"]);
    assert!(fx.store.contains(&sha256_hex(b"roar")).await);
    assert_eq!(fx.store.read(&sha256_hex(b"hoot")).await.unwrap(), b"hoot");

    match events.try_recv().unwrap() {
        Event::RepositoryVersionCreated { repository, number } => {
            assert_eq!(repository, "zoo");
            assert_eq!(number, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_unchanged_feed_creates_no_version() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    fx.feed.publish(BASE, &[("lion.txt", "roar")]);

    fx.sync(SyncOptions::default()).await.unwrap();
    let created = fx.sync(SyncOptions::default()).await.unwrap();

    assert!(created.is_empty());
    assert_eq!(fx.latest().await, 1);
}

#[tokio::test]
async fn test_additive_sync_keeps_removed_units() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    fx.feed.publish(BASE, &[("lion.txt", "roar"), ("owl.txt", "hoot")]);
    fx.sync(SyncOptions::default()).await.unwrap();

    fx.feed.publish(BASE, &[("owl.txt", "hoot hoot"), ("wolf.txt", "howl")]);
    fx.sync(SyncOptions::default()).await.unwrap();

    assert_eq!(fx.latest().await, 2);
    assert_eq!(fx.paths(2).await, vec!["lion.txt", "owl.txt", "wolf.txt"]);

    let owl = fx
        .db
        .version_content("zoo", 2)
        .await
        .unwrap()
        .into_iter()
        .find(|u| u.relative_path == "owl.txt")
        .unwrap();
    assert_eq!(owl.sha256, sha256_hex(b"hoot hoot"));

    // The previous version is untouched
    assert_eq!(fx.paths(1).await, vec!["lion.txt", "owl.txt"]);
}

#[tokio::test]
async fn test_mirror_sync_matches_remote_exactly() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    fx.feed.publish(BASE, &[("lion.txt", "roar"), ("owl.txt", "hoot")]);
    fx.sync(SyncOptions::default()).await.unwrap();

    fx.feed.publish(BASE, &[("wolf.txt", "howl")]);
    fx.sync(SyncOptions { mirror: true }).await.unwrap();

    assert_eq!(fx.paths(2).await, vec!["wolf.txt"]);
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_repository_unchanged() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    fx.feed.publish(BASE, &[("lion.txt", "roar"), ("owl.txt", "hoot")]);
    // Corrupt one unit after publishing
    fx.feed.serve(&format!("{}/owl.txt", BASE), "HOOT");

    let err = fx.sync(SyncOptions::default()).await.unwrap_err();

    match err {
        Error::Checksum {
            relative_path,
            expected,
            actual,
        } => {
            assert_eq!(relative_path, "owl.txt");
            assert_eq!(expected, sha256_hex(b"hoot"));
            assert_eq!(actual, sha256_hex(b"HOOT"));
        }
        other => panic!("expected checksum error, got {:?}", other),
    }
    assert_eq!(fx.latest().await, 0);
    assert!(fx.paths(0).await.is_empty());
}

#[tokio::test]
async fn test_size_mismatch_fails() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    let manifest = format!("lion.txt,{},99\n", sha256_hex(b"roar"));
    fx.feed.serve(&manifest_url(BASE), manifest);
    fx.feed.serve(&format!("{}/lion.txt", BASE), "roar");

    let err = fx.sync(SyncOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Feed(ref msg) if msg.contains("expected 99 bytes")));
    assert_eq!(fx.latest().await, 0);
}

#[tokio::test]
async fn test_canceled_sync_commits_nothing() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    fx.feed.publish(BASE, &[("lion.txt", "roar")]);

    let token = CancellationToken::new();
    token.cancel();
    let ctx = TaskContext::new(TaskId(7), token);
    let result = fx.work(SyncOptions::default()).run(&ctx).await;

    assert!(matches!(result, Err(Error::Canceled)));
    assert_eq!(fx.latest().await, 0);
    assert_eq!(fx.feed.fetch_count(), 0);
}

#[tokio::test]
async fn test_repository_without_remotes_fails() {
    let fx = fixture(&[]).await;
    let err = fx.sync(SyncOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Feed(ref msg) if msg.contains("no remotes")));
}

#[tokio::test]
async fn test_unknown_repository_fails() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    let work = SyncWork::new(
        fx.db.clone(),
        fx.store.clone(),
        fx.feed.clone(),
        fx.event_tx.clone(),
        "nope",
        SyncOptions::default(),
    );
    let ctx = TaskContext::new(TaskId(1), CancellationToken::new());
    assert!(matches!(work.run(&ctx).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_remotes_are_merged_and_earlier_remote_wins() {
    let second = "https://mirror.example/zoo";
    let fx = fixture(&[&manifest_url(BASE), &manifest_url(second)]).await;
    fx.feed.publish(BASE, &[("lion.txt", "roar")]);
    fx.feed.publish(second, &[("lion.txt", "meow"), ("owl.txt", "hoot")]);

    fx.sync(SyncOptions::default()).await.unwrap();

    let units = fx.db.version_content("zoo", 1).await.unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].relative_path, "lion.txt");
    assert_eq!(units[0].sha256, sha256_hex(b"roar"));
    assert_eq!(units[1].relative_path, "owl.txt");
}

#[tokio::test]
async fn test_stored_blobs_are_not_downloaded_again() {
    let fx = fixture(&[&manifest_url(BASE)]).await;
    fx.feed.publish(BASE, &[("lion.txt", "roar")]);
    fx.sync(SyncOptions::default()).await.unwrap();
    // manifest + one unit
    assert_eq!(fx.feed.fetch_count(), 2);

    // Same bytes under a new path: only the manifest is fetched
    fx.feed.publish(BASE, &[("lion.txt", "roar"), ("cat.txt", "roar")]);
    fx.sync(SyncOptions::default()).await.unwrap();
    assert_eq!(fx.feed.fetch_count(), 3);
    assert_eq!(fx.paths(2).await, vec!["cat.txt", "lion.txt"]);
}

#[tokio::test]
async fn test_sync_over_http() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    let manifest = format!(
        "tigers/stripes.txt,{},7\n",
        sha256_hex(b"stripes")
    );
    Mock::given(method("GET"))
        .and(path("/zoo/manifest.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/zoo/tigers/stripes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stripes"))
        .expect(1)
        .mount(&server)
        .await;

    let fx = fixture(&[&format!("{}/zoo/manifest.csv", server.uri())]).await;
    let feed = Arc::new(HttpFeed::new(SyncConfig {
        request_timeout: Duration::from_secs(5),
        user_agent: "content-depot-test".to_string(),
        retry: RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 1.0,
            jitter: false,
        },
    }));
    let work = SyncWork::new(
        fx.db.clone(),
        fx.store.clone(),
        feed,
        fx.event_tx.clone(),
        "zoo",
        SyncOptions::default(),
    );

    let ctx = TaskContext::new(TaskId(1), CancellationToken::new());
    work.run(&ctx).await.unwrap();

    assert_eq!(fx.paths(1).await, vec!["tigers/stripes.txt"]);
}
