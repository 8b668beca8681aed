//! Retrying remote feed requests
//!
//! [`with_retry`] re-runs a fetch while it fails with a transient error,
//! sleeping between attempts on an exponential schedule ([`Backoff`]).
//! Whether an error is transient is decided by [`IsRetryable`].
//!
//! ```no_run
//! use content_depot::config::RetryConfig;
//! use content_depot::error::Error;
//! use content_depot::retry::with_retry;
//!
//! # async fn example(client: reqwest::Client) -> Result<(), Error> {
//! let manifest = with_retry(&RetryConfig::default(), || {
//!     let client = client.clone();
//!     async move {
//!         let response = client
//!             .get("https://feeds.example/zoo/manifest.csv")
//!             .send()
//!             .await?
//!             .error_for_status()?;
//!         Ok::<_, Error>(response.text().await?)
//!     }
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies failures as worth another attempt or not
pub trait IsRetryable {
    /// True when the same request may succeed if sent again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => match e.status() {
                // Feed answered: only overload and server faults are transient
                Some(status) => status.is_server_error() || status.as_u16() == 429,
                None => e.is_timeout() || e.is_connect() || e.is_request(),
            },
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Wrong bytes or a bad manifest stay wrong
            Error::Feed(_) | Error::Checksum { .. } => false,
            // Stop at once when the task is being torn down
            Error::Canceled | Error::ShuttingDown => false,
            Error::Validation { .. }
            | Error::Conflict(_)
            | Error::NotFound(_)
            | Error::Config { .. }
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::Archive(_)
            | Error::Serialization(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Delay schedule between attempts
///
/// Starts at `initial_delay`, multiplies by `backoff_multiplier` after each
/// attempt, and never exceeds `max_delay` before jitter is applied. Yields
/// `None` once `max_attempts` retries have been handed out.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
    remaining: u32,
}

impl Backoff {
    /// Schedule for `config`
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay.min(config.max_delay),
            max: config.max_delay,
            multiplier: config.backoff_multiplier.max(1.0),
            jitter: config.jitter,
            remaining: config.max_attempts,
        }
    }

    /// Delay before the next retry, or `None` when retries are used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let base = self.next;
        self.next = Duration::from_secs_f64(base.as_secs_f64() * self.multiplier).min(self.max);

        Some(if self.jitter { jittered(base) } else { base })
    }
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn jittered(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
///
/// The operation runs once plus up to `config.max_attempts` retries. The last
/// error is returned unchanged.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);
    let mut attempt: u32 = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "feed request succeeded after retrying");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !error.is_retryable() {
            tracing::debug!(attempt, error = %error, "feed request failed permanently");
            return Err(error);
        }

        let Some(delay) = backoff.next_delay() else {
            tracing::warn!(attempt, error = %error, "feed request failed, no retries left");
            return Err(error);
        };

        tracing::warn!(
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "feed request failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
