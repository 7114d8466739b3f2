//! HTTP mirror engine: request policy, streaming fetches, retries and the
//! bounded worker pool.
//!
//! # Features
//!
//! - Streaming downloads straight to the mapped local path
//! - Configurable headers (User-Agent, Referer, Accept, Accept-Encoding, Connection)
//! - Exponential backoff on transient failures, honouring `Retry-After`
//! - Fixed slot assignment (`slot = task index % concurrency`) with busy/idle events
//! - Cooperative cancellation between dispatches
//!
//! # Example
//!
//! ```no_run
//! use sitemirror_core::download::{RequestOptions, RequestPolicy, RefererMode};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RequestPolicy::from_options(&RequestOptions {
//!     referer: RefererMode::Dynamic,
//!     identity_encoding: true,
//!     ..RequestOptions::default()
//! })?;
//! assert!(policy.dynamic_referer());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod fetch;
mod policy;
mod pool;
mod retry;

pub use client::HttpClient;
pub use constants::DEFAULT_MAX_RETRIES;
pub use engine::{
    DEFAULT_CONCURRENCY, EngineError, MAX_CONCURRENCY, MIN_CONCURRENCY, MirrorEngine, MirrorJob,
    RunHandle,
};
pub use error::{ConfigError, DownloadError};
pub use fetch::{FetchUnit, Outcome};
pub use policy::{
    DEFAULT_ACCEPT, RefererMode, RequestOptions, RequestPolicy, UserAgentChoice,
    derive_parent_referer,
};
pub use pool::WorkerPool;
pub use retry::{RetryDecision, RetryPolicy, RetryStop, parse_retry_after};

// Note: no module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
