//! Mirror engine: scans a local tree and refreshes every mapped file from the
//! remote root through a bounded [`WorkerPool`].
//!
//! # Overview
//!
//! A run is one [`MirrorJob`] executed by a [`MirrorEngine`]. The engine
//! reports through an [`EventSender`]; [`MirrorEngine::spawn`] wires a fresh
//! channel and cancellation token and hands both back in a [`RunHandle`].
//!
//! # Example
//!
//! ```no_run
//! use sitemirror_core::download::{MirrorEngine, MirrorJob, RequestPolicy};
//! use sitemirror_core::mapper::ExtensionFilter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let job = MirrorJob::new("./site", "https://cdn.example.com/site", ExtensionFilter::default())?;
//! let engine = MirrorEngine::new(5, RequestPolicy::default())?;
//! let mut handle = engine.spawn(job);
//! while let Some(event) = handle.events.recv().await {
//!     println!("{event:?}");
//! }
//! let summary = handle.join.await?;
//! println!("{} of {} refreshed", summary.completed, summary.total);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

use super::client::HttpClient;
use super::error::ConfigError;
use super::policy::RequestPolicy;
use super::pool::WorkerPool;
use crate::mapper::{ExtensionFilter, MapError, PathMapper};
use crate::progress::{
    EventReceiver, EventSender, LogLevel, ProgressAggregator, RunSummary, event_channel,
};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Error type for engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Rejected configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The shared HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// What to mirror: a local root, its remote counterpart, and which files.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    local_root: PathBuf,
    remote_root: String,
    filter: ExtensionFilter,
}

impl MirrorJob {
    /// Validates and creates a job.
    ///
    /// The local root does not have to exist yet; a missing root is reported
    /// by the run itself.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyLocalRoot`] if `local_root` is empty
    /// - [`ConfigError::InvalidRemoteRoot`] unless `remote_root` is an absolute
    ///   http(s) URL
    pub fn new(
        local_root: impl Into<PathBuf>,
        remote_root: &str,
        filter: ExtensionFilter,
    ) -> Result<Self, ConfigError> {
        let local_root = local_root.into();
        if local_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyLocalRoot);
        }

        let remote_root = remote_root.trim();
        validate_remote_root(remote_root)?;

        Ok(Self {
            local_root,
            remote_root: remote_root.to_string(),
            filter,
        })
    }

    #[must_use]
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    #[must_use]
    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    #[must_use]
    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    fn mapper(&self) -> PathMapper {
        PathMapper::new(&self.local_root, &self.remote_root, self.filter.clone())
    }
}

fn validate_remote_root(remote_root: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidRemoteRoot {
        url: remote_root.to_string(),
        reason: reason.to_string(),
    };

    if remote_root.is_empty() {
        return Err(invalid("remote root is empty"));
    }
    let url = Url::parse(remote_root).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

/// A run in progress, started by [`MirrorEngine::spawn`].
#[derive(Debug)]
pub struct RunHandle {
    /// Engine events, in emission order. Closes when the run ends.
    pub events: EventReceiver,
    /// Cancelling stops dispatch; in-flight fetches still finish.
    pub cancel: CancellationToken,
    /// Resolves to the run's totals.
    pub join: JoinHandle<RunSummary>,
}

/// Runs mirror jobs over a shared HTTP client and a bounded worker pool.
#[derive(Debug)]
pub struct MirrorEngine {
    pool: WorkerPool,
}

impl MirrorEngine {
    /// Creates an engine with `concurrency` slots.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidConcurrency`] unless
    ///   `MIN_CONCURRENCY <= concurrency <= MAX_CONCURRENCY`
    /// - [`EngineError::HttpClient`] if the client cannot be built
    pub fn new(concurrency: usize, policy: RequestPolicy) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: concurrency,
                min: MIN_CONCURRENCY,
                max: MAX_CONCURRENCY,
            }
            .into());
        }

        let client = HttpClient::for_policy(&policy, concurrency).map_err(EngineError::HttpClient)?;
        info!(concurrency, "mirror engine created");
        Ok(Self {
            pool: WorkerPool::new(concurrency, client, Arc::new(policy)),
        })
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.pool.concurrency()
    }

    /// Executes one run to completion.
    ///
    /// A missing local root and an empty scan both end the run with a single
    /// log line and a final `Progress { percent: 100 }`; no slot is used.
    /// Otherwise `Progress { percent: 0 }` is emitted before the first
    /// dispatch.
    #[instrument(skip_all, fields(local_root = %job.local_root().display(), remote_root = job.remote_root()))]
    pub async fn run(
        &self,
        job: &MirrorJob,
        events: EventSender,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let scan = match job.mapper().scan() {
            Ok(scan) => scan,
            Err(MapError::DirectoryNotFound { path }) => {
                let aggregator = ProgressAggregator::new(0, 0, events);
                aggregator.log(
                    LogLevel::Error,
                    format!("Local directory '{}' does not exist.", path.display()),
                );
                aggregator.report_progress();
                return aggregator.summary();
            }
        };

        let total = scan.tasks.len();
        let aggregator = Arc::new(ProgressAggregator::new(
            total,
            self.pool.concurrency().min(total),
            events,
        ));

        for warning in &scan.warnings {
            let message = match &warning.path {
                Some(path) => format!("Skipped {}: {}", path.display(), warning.message),
                None => format!("Skipped entry: {}", warning.message),
            };
            aggregator.log(LogLevel::Warn, message);
        }

        if total == 0 {
            aggregator.log(LogLevel::Info, "No files found in the local directory.");
            aggregator.report_progress();
            return aggregator.summary();
        }

        aggregator.log(
            LogLevel::Info,
            format!(
                "Found {total} file(s); refreshing with {} slot(s)",
                self.pool.concurrency()
            ),
        );
        aggregator.report_progress();

        self.pool
            .dispatch(scan.tasks, Arc::clone(&aggregator), cancel)
            .await;

        let summary = aggregator.summary();
        aggregator.log(
            LogLevel::Info,
            format!(
                "Finished: {} of {} refreshed, {} failed, {} skipped",
                summary.completed,
                summary.total,
                summary.failed(),
                summary.skipped
            ),
        );
        summary
    }

    /// Starts `job` on the current runtime and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(self, job: MirrorJob) -> RunHandle {
        let (tx, events) = event_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.run(&job, tx, &token).await });
        RunHandle {
            events,
            cancel,
            join,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::progress::EngineEvent;

    fn drain(rx: &mut EventReceiver) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_engine_new_valid_concurrency() {
        for concurrency in [MIN_CONCURRENCY, DEFAULT_CONCURRENCY, MAX_CONCURRENCY] {
            let engine = MirrorEngine::new(concurrency, RequestPolicy::default()).unwrap();
            assert_eq!(engine.concurrency(), concurrency);
        }
    }

    #[test]
    fn test_engine_new_invalid_concurrency_zero() {
        let err = MirrorEngine::new(0, RequestPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::InvalidConcurrency { value: 0, .. })
        ));
    }

    #[test]
    fn test_engine_new_invalid_concurrency_too_high() {
        let err = MirrorEngine::new(101, RequestPolicy::default()).unwrap_err();
        assert!(err.to_string().contains("101"));
        assert!(err.to_string().contains("between 1 and 100"));
    }

    #[test]
    fn test_default_concurrency_constant() {
        assert_eq!(DEFAULT_CONCURRENCY, 5);
    }

    #[test]
    fn test_job_rejects_empty_local_root() {
        let err = MirrorJob::new("", "https://h", ExtensionFilter::default()).unwrap_err();
        assert_eq!(err, ConfigError::EmptyLocalRoot);
    }

    #[test]
    fn test_job_rejects_bad_remote_roots() {
        for remote in ["", "   ", "cdn.example.com/x", "ftp://h/x", "file:///tmp/x"] {
            let err = MirrorJob::new("/tmp", remote, ExtensionFilter::default()).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidRemoteRoot { .. }),
                "{remote:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_job_trims_remote_root_whitespace() {
        let job = MirrorJob::new("/tmp", "  https://h/x/ ", ExtensionFilter::default()).unwrap();
        assert_eq!(job.remote_root(), "https://h/x/");
    }

    #[tokio::test]
    async fn test_run_missing_directory_reports_and_finishes() {
        let temp = TempDir::new().unwrap();
        let job = MirrorJob::new(
            temp.path().join("missing"),
            "https://h",
            ExtensionFilter::default(),
        )
        .unwrap();
        let engine = MirrorEngine::new(2, RequestPolicy::default()).unwrap();
        let (tx, mut rx) = event_channel();

        let summary = engine.run(&job, tx, &CancellationToken::new()).await;

        assert_eq!(summary.total, 0);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            EngineEvent::Log { level: LogLevel::Error, message } if message.contains("does not exist")
        ));
        assert_eq!(events[1], EngineEvent::Progress { percent: 100 });
    }

    #[tokio::test]
    async fn test_run_empty_directory_emits_single_progress() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("readme.txt"), b"not an image").unwrap();
        let job = MirrorJob::new(temp.path(), "https://h", ExtensionFilter::default()).unwrap();
        let engine = MirrorEngine::new(3, RequestPolicy::default()).unwrap();
        let (tx, mut rx) = event_channel();

        let summary = engine.run(&job, tx, &CancellationToken::new()).await;

        assert_eq!(summary.total, 0);
        assert_eq!(summary.percent, 100);
        let events = drain(&mut rx);
        let progress: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Progress { .. }))
            .collect();
        assert_eq!(progress, vec![&EngineEvent::Progress { percent: 100 }]);
        assert!(events.iter().all(|e| !matches!(e, EngineEvent::SlotStatus { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::Log { message, .. } if message == "No files found in the local directory."
        )));
    }

    #[tokio::test]
    async fn test_run_cancelled_before_dispatch_skips_all_tasks() {
        let temp = TempDir::new().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(temp.path().join(name), b"x").unwrap();
        }
        let job = MirrorJob::new(temp.path(), "http://127.0.0.1:9", ExtensionFilter::default())
            .unwrap();
        let engine = MirrorEngine::new(2, RequestPolicy::default()).unwrap();

        let (tx, _rx) = event_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = engine.run(&job, tx, &cancel).await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.percent, 0);
    }

    #[tokio::test]
    async fn test_spawn_closes_event_stream_when_done() {
        let temp = TempDir::new().unwrap();
        let job = MirrorJob::new(temp.path(), "https://h", ExtensionFilter::default()).unwrap();
        let engine = MirrorEngine::new(1, RequestPolicy::default()).unwrap();

        let mut handle = engine.spawn(job);
        let mut seen = Vec::new();
        while let Some(event) = handle.events.recv().await {
            seen.push(event);
        }
        let summary = handle.join.await.unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(seen.last(), Some(&EngineEvent::Progress { percent: 100 }));
    }
}
