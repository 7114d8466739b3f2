//! Retry logic with exponential backoff for transient fetch failures.
//!
//! Retry behavior is an explicit, independently testable policy rather than
//! something hidden inside the HTTP client configuration:
//!
//! - [`RetryPolicy::backoff_delay`] maps a retry index to a delay
//! - [`RetryPolicy::is_retryable_status`] decides whether a status is transient
//! - [`RetryPolicy::should_retry`] combines both with the attempt budget
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use sitemirror_core::download::{DownloadError, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, 0.5);
//! assert_eq!(policy.backoff_delay(0), Duration::from_millis(500));
//! assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
//!
//! let error = DownloadError::http_status("https://example.com/a.png", 503);
//! assert!(matches!(policy.should_retry(&error, 1), RetryDecision::Retry { .. }));
//! ```

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::DownloadError;
use super::constants::{
    DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_STATUSES, MAX_BACKOFF,
};

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// The attempt number about to be made (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Why no retry will happen.
        reason: RetryStop,
    },
}

/// Reason a failed attempt is not retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStop {
    /// The failure is not transient (non-retryable status, local IO, bad URL).
    Permanent,
    /// The failure is transient but the retry budget is spent.
    Exhausted,
}

/// Retry configuration: attempt budget, backoff curve and retryable statuses.
///
/// Delay for the n-th retry (0-indexed):
///
/// ```text
/// delay = min(backoff_base * 2^n, 120s) + jitter
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base: f64,
    retryable_statuses: BTreeSet<u16>,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BACKOFF_BASE)
    }
}

impl RetryPolicy {
    /// Creates a policy with the default retryable statuses and no jitter.
    ///
    /// A non-finite or negative `backoff_base` falls back to the default; zero
    /// retries immediately.
    #[must_use]
    pub fn new(max_retries: u32, backoff_base: f64) -> Self {
        let backoff_base = if backoff_base.is_finite() && backoff_base >= 0.0 {
            backoff_base
        } else {
            DEFAULT_BACKOFF_BASE
        };
        Self {
            max_retries,
            backoff_base,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            max_jitter: Duration::ZERO,
        }
    }

    /// Replaces the set of statuses considered transient.
    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Adds up to `max_jitter` of random delay on top of every backoff.
    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff base in seconds.
    #[must_use]
    pub fn backoff_base(&self) -> f64 {
        self.backoff_base
    }

    /// Upper bound of the random delay added to each computed backoff.
    #[must_use]
    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    /// Statuses considered transient.
    #[must_use]
    pub fn retryable_statuses(&self) -> &BTreeSet<u16> {
        &self.retryable_statuses
    }

    /// Whether `status` is eligible for automatic retry.
    #[must_use]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Deterministic backoff for the `retry_index`-th retry (0-indexed), capped.
    #[must_use]
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let secs = self.backoff_base * 2f64.powi(exponent);
        if !secs.is_finite() || secs >= MAX_BACKOFF.as_secs_f64() {
            return MAX_BACKOFF;
        }
        Duration::from_secs_f64(secs)
    }

    /// Whether a failed attempt is transient at all, ignoring the budget.
    #[must_use]
    pub fn is_transient(&self, error: &DownloadError) -> bool {
        match error {
            DownloadError::HttpStatus { status, .. } => self.is_retryable_status(*status),
            DownloadError::Network { .. }
            | DownloadError::Timeout { .. }
            | DownloadError::BodyRead { .. } => true,
            DownloadError::Io { .. } | DownloadError::InvalidUrl { .. } => false,
        }
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed with `error`.
    ///
    /// A `Retry-After` header on a retryable status replaces the computed
    /// backoff, still capped at the maximum delay.
    #[instrument(level = "debug", skip(self, error), fields(max_retries = self.max_retries))]
    pub fn should_retry(&self, error: &DownloadError, attempt: u32) -> RetryDecision {
        if !self.is_transient(error) {
            return RetryDecision::DoNotRetry {
                reason: RetryStop::Permanent,
            };
        }

        if attempt >= self.max_attempts() {
            debug!(attempt, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: RetryStop::Exhausted,
            };
        }

        let retry_after = match error {
            DownloadError::HttpStatus {
                retry_after: Some(value),
                ..
            } => parse_retry_after(value),
            _ => None,
        };
        let delay = retry_after
            .unwrap_or_else(|| self.backoff_delay(attempt.saturating_sub(1)) + self.jitter());

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            using_retry_after = retry_after.is_some(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Parses a Retry-After header (delta-seconds or HTTP-date), capped at the backoff cap.
///
/// Returns `None` for unparseable, negative or past values.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds).ok()?;
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    match datetime.duration_since(SystemTime::now()) {
        Ok(duration) => Some(cap_retry_after(duration)),
        Err(_) => {
            debug!(header_value, "Retry-After date is in the past, ignoring");
            None
        }
    }
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_BACKOFF {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_BACKOFF.as_secs(),
            "Retry-After exceeds maximum, capping"
        );
        MAX_BACKOFF
    } else {
        duration
    }
}
