//! Repeated bulk sync against a list of feeds
//!
//! Reads a feed file where each line is
//! `repo_id, feed_url, feed_ca, feed_cert` (the last two are paths to PEM
//! files and may be left empty), creates each repository unless it already
//! exists, then loops: schedule a sync of every repository and wait for all
//! of them to finish. Runs `--num-syncs` iterations, or forever when 0.
//!
//! ```text
//! cargo run --example sync_stress -- --feed-urls feeds.csv --num-syncs 10
//! ```

use clap::Parser;
use content_depot::config::{Config, StorageConfig};
use content_depot::monitor::{PollOptions, TaskOutcome, await_all};
use content_depot::{Depot, NewRemote, NewRepository, TaskId, TaskState};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "sync_stress",
    about = "Sync a set of repositories over and over, waiting for each round to finish"
)]
struct Cli {
    /// File listing `repo_id, feed_url, feed_ca, feed_cert` per line
    #[arg(long)]
    feed_urls: PathBuf,

    /// Number of full iterations; 0 loops forever
    #[arg(long, default_value_t = 0)]
    num_syncs: u64,

    /// Seconds between task status polls
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Database file
    #[arg(long, default_value = "depot.db")]
    database: PathBuf,

    /// Content store directory
    #[arg(long, default_value = "content")]
    content_dir: PathBuf,
}

/// One line of the feed file
struct FeedLine {
    repo_id: String,
    url: String,
    ca_path: Option<PathBuf>,
    cert_path: Option<PathBuf>,
}

fn parse_feed_file(path: &Path) -> Result<Vec<FeedLine>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let mut feeds = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let pieces: Vec<&str> = line.split(',').map(str::trim).collect();
        if pieces.len() != 4 {
            return Err(format!(
                "{} line {}: expected 4 comma-separated fields, found {}",
                path.display(),
                number + 1,
                pieces.len()
            )
            .into());
        }
        let optional = |s: &str| (!s.is_empty()).then(|| PathBuf::from(s));
        feeds.push(FeedLine {
            repo_id: pieces[0].to_string(),
            url: pieces[1].to_string(),
            ca_path: optional(pieces[2]),
            cert_path: optional(pieces[3]),
        });
    }

    Ok(feeds)
}

fn read_pem(path: Option<&PathBuf>) -> std::io::Result<Option<String>> {
    path.map(std::fs::read_to_string).transpose()
}

async fn create_repositories(
    depot: &Depot,
    feeds: &[FeedLine],
) -> Result<(), Box<dyn std::error::Error>> {
    for feed in feeds {
        if depot.get_repository(&feed.repo_id).await.is_ok() {
            tracing::info!(repository = %feed.repo_id, "reusing existing repository");
            continue;
        }

        tracing::info!(repository = %feed.repo_id, feed = %feed.url, "creating repository");
        depot
            .create_repository(NewRepository::named(&feed.repo_id).with_remote(NewRemote {
                url: feed.url.clone(),
                ca_cert: read_pem(feed.ca_path.as_ref())?,
                client_cert: read_pem(feed.cert_path.as_ref())?,
            }))
            .await?;
    }
    Ok(())
}

async fn sync_round(
    depot: &Depot,
    feeds: &[FeedLine],
    options: &PollOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut task_ids: Vec<TaskId> = Vec::new();
    for feed in feeds {
        match depot.sync(&feed.repo_id).await? {
            Some(task) => task_ids.push(task.id),
            None => tracing::warn!(repository = %feed.repo_id, "failed to create a sync task"),
        }
    }

    let outcomes = await_all(depot, &task_ids, options).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match outcome {
            TaskOutcome::Finished(task) if task.state == TaskState::Failed => {
                failed += 1;
                tracing::warn!(
                    task_id = %task.id,
                    name = %task.name,
                    error = ?task.error,
                    "sync failed"
                );
            }
            TaskOutcome::Finished(_) => {}
            TaskOutcome::Pending(task) => {
                tracing::warn!(task_id = %task.id, state = %task.state, "sync still active");
            }
            TaskOutcome::Missing(id) => tracing::warn!(task_id = %id, "error looking up task"),
        }
    }
    tracing::info!(tasks = outcomes.len(), failed, "round complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_stress=info,content_depot=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let feeds = parse_feed_file(&cli.feed_urls)?;

    let depot = Depot::new(Config {
        storage: StorageConfig {
            database_path: cli.database,
            content_dir: cli.content_dir,
        },
        ..Default::default()
    })
    .await?;

    tracing::info!(repositories = feeds.len(), "start sync test");
    create_repositories(&depot, &feeds).await?;

    let options = PollOptions {
        interval: Duration::from_secs(cli.poll_interval),
        timeout: None,
    };
    let mut iteration: u64 = 0;
    while cli.num_syncs == 0 || iteration < cli.num_syncs {
        tracing::info!(iteration, "full iteration");
        sync_round(&depot, &feeds, &options).await?;
        iteration += 1;
    }

    tracing::info!("end sync test");
    depot.shutdown().await?;
    Ok(())
}
