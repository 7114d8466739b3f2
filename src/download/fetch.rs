//! One task's fetch: slot bookkeeping, retry loop and outcome reporting.

use std::sync::Arc;

use reqwest::header::REFERER;
use serde::Serialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::client::HttpClient;
use super::error::DownloadError;
use super::policy::RequestPolicy;
use super::retry::{RetryDecision, RetryStop};
use crate::mapper::DownloadTask;
use crate::progress::ProgressAggregator;

/// Terminal result of one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The body was written to the local path.
    Success { bytes_written: u64 },
    /// The server answered with a non-retryable status other than 200.
    HttpFailure { status: u16 },
    /// The request never produced a usable response, after all retries.
    TransportFailure { detail: String },
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Marks a slot busy on creation and idle on drop, including during unwinding.
struct SlotGuard<'a> {
    aggregator: &'a ProgressAggregator,
    slot: usize,
}

impl<'a> SlotGuard<'a> {
    fn busy(aggregator: &'a ProgressAggregator, slot: usize) -> Self {
        aggregator.slot_busy(slot);
        Self { aggregator, slot }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.aggregator.slot_idle(self.slot);
    }
}

/// Everything one slot needs to fetch one task.
#[derive(Debug, Clone)]
pub struct FetchUnit {
    pub slot: usize,
    pub task: DownloadTask,
    pub client: HttpClient,
    pub policy: Arc<RequestPolicy>,
    pub aggregator: Arc<ProgressAggregator>,
}

impl FetchUnit {
    /// Runs the fetch and records its outcome.
    ///
    /// The slot is reported busy before the first request and idle on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Only local failures ([`DownloadError::Io`]) are returned; they are
    /// reported by the pool as unhandled worker errors. Every network result is
    /// recorded as an [`Outcome`].
    #[instrument(level = "debug", skip(self), fields(slot = self.slot, url = %self.task.remote_url()))]
    pub async fn run(self) -> Result<Outcome, DownloadError> {
        let _guard = SlotGuard::busy(&self.aggregator, self.slot);

        let outcome = self.fetch_with_retry().await?;
        self.aggregator
            .record_outcome(self.slot, &self.task, outcome.clone());
        Ok(outcome)
    }

    async fn fetch_with_retry(&self) -> Result<Outcome, DownloadError> {
        let url_str = self.task.remote_url();
        let Ok(url) = Url::parse(url_str) else {
            return Ok(Outcome::TransportFailure {
                detail: DownloadError::invalid_url(url_str).to_string(),
            });
        };

        let mut headers = self.policy.headers().clone();
        if let Some(referer) = self.policy.referer_for(&url) {
            headers.insert(REFERER, referer);
        }

        let retry = self.policy.retry();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            let error = match self
                .client
                .fetch_to_file(&url, &headers, self.task.local_path())
                .await
            {
                Ok(bytes_written) => return Ok(Outcome::Success { bytes_written }),
                Err(error) if error.is_local() => return Err(error),
                Err(error) => error,
            };

            match retry.should_retry(&error, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        url = %url,
                        attempt = next_attempt,
                        max_attempts = retry.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(?reason, attempt, "not retrying fetch");
                    return Ok(terminal_outcome(&error, reason, attempt));
                }
            }
        }
    }
}

/// Maps the last error of a finished retry loop to an [`Outcome`].
///
/// A retryable status that outlives the retry budget is a transport failure,
/// like any other exhausted retry; other statuses are HTTP failures.
fn terminal_outcome(error: &DownloadError, stop: RetryStop, attempts: u32) -> Outcome {
    match (error, stop) {
        (DownloadError::HttpStatus { status, .. }, RetryStop::Permanent) => {
            Outcome::HttpFailure { status: *status }
        }
        (DownloadError::HttpStatus { status, .. }, RetryStop::Exhausted) => {
            Outcome::TransportFailure {
                detail: format!(
                    "gave up after {attempts} attempt(s): too many HTTP {status} responses"
                ),
            }
        }
        (error, RetryStop::Exhausted) => Outcome::TransportFailure {
            detail: format!("gave up after {attempts} attempt(s): {}", error_chain(error)),
        },
        (error, RetryStop::Permanent) => Outcome::TransportFailure {
            detail: error_chain(error),
        },
    }
}

/// The error and all of its sources, joined with `": "`.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !detail.contains(&text) {
            detail.push_str(": ");
            detail.push_str(&text);
        }
        source = cause.source();
    }
    detail
}
