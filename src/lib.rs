//! Sitemirror Core Library
//!
//! Refreshes a local directory tree from a remote HTTP server: every allowed
//! file under the local root is re-fetched from the matching URL under the
//! remote root and overwritten in place, several files at a time.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`mapper`] - Local tree walk and local path → remote URL mapping
//! - [`download`] - Request policy, streaming fetch, retries, worker pool, engine
//! - [`progress`] - Shared run state and the engine event stream
//! - [`user_agent`] - Built-in User-Agent presets
//!
//! Presentation (progress bars, log panes) lives in the binary and consumes
//! [`progress::EngineEvent`]s.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod mapper;
pub mod progress;
pub mod user_agent;

// Re-export commonly used types
pub use download::{
    ConfigError, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadError, EngineError,
    HttpClient, MirrorEngine, MirrorJob, Outcome, RefererMode, RequestOptions, RequestPolicy,
    RetryDecision, RetryPolicy, RunHandle, UserAgentChoice,
};
pub use mapper::{DownloadTask, ExtensionFilter, MapError, PathMapper};
pub use progress::{EngineEvent, LogLevel, ProgressAggregator, RunSummary, SlotState};
pub use user_agent::UserAgentPreset;
