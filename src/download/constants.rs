//! Constants for the download module (timeouts, retry, streaming).

use std::time::Duration;

/// Default per-request timeout (connect and per-read), in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff base in seconds (first retry waits this long).
pub const DEFAULT_BACKOFF_BASE: f64 = 0.5;

/// Largest random jitter accepted on top of a backoff delay, in milliseconds.
pub const MAX_RETRY_JITTER_MS: u64 = 10_000;

/// Upper bound for a single backoff or Retry-After delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Maximum redirect hops followed per request.
pub const MAX_REDIRECTS: usize = 10;

/// Size of the buffered writer used when streaming a body to disk.
pub const WRITE_CHUNK_SIZE: usize = 8 * 1024;
