//! Bounded worker pool: a fixed set of slots, each draining its own lane of
//! tasks one at a time.
//!
//! Task `i` is assigned to slot `i % concurrency`. A slot never runs two tasks
//! at once, so its busy/idle events are strictly ordered; different slots run
//! in parallel on the multi-threaded runtime.

use std::any::Any;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::client::HttpClient;
use super::fetch::FetchUnit;
use super::policy::RequestPolicy;
use crate::mapper::DownloadTask;
use crate::progress::ProgressAggregator;

/// Fixed-size pool of execution slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    client: HttpClient,
    policy: Arc<RequestPolicy>,
}

impl WorkerPool {
    /// Creates a pool. `concurrency` is assumed to be validated (>= 1).
    #[must_use]
    pub fn new(concurrency: usize, client: HttpClient, policy: Arc<RequestPolicy>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            client,
            policy,
        }
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Slot that task `index` runs on.
    #[must_use]
    pub fn slot_for(&self, index: usize) -> usize {
        index % self.concurrency
    }

    /// Dispatches every task and waits until each one reaches a terminal state
    /// or is skipped because `cancel` fired before it started.
    ///
    /// Failures inside a unit, including panics, are reported through the
    /// aggregator and never abort sibling units.
    #[instrument(level = "debug", skip_all, fields(tasks = tasks.len(), concurrency = self.concurrency))]
    pub async fn dispatch(
        &self,
        tasks: Vec<DownloadTask>,
        aggregator: Arc<ProgressAggregator>,
        cancel: &CancellationToken,
    ) {
        let tasks: Arc<[DownloadTask]> = tasks.into();
        let active_slots = self.concurrency.min(tasks.len());
        let mut lanes = JoinSet::new();

        for slot in 0..active_slots {
            let lane = SlotLane {
                slot,
                indices: (0..tasks.len())
                    .filter(|&index| self.slot_for(index) == slot)
                    .collect(),
                tasks: Arc::clone(&tasks),
                client: self.client.clone(),
                policy: Arc::clone(&self.policy),
                aggregator: Arc::clone(&aggregator),
                cancel: cancel.clone(),
            };
            lanes.spawn(lane.run());
        }

        debug!(active_slots, "waiting for slots to drain");

        while let Some(result) = lanes.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "slot lane terminated abnormally");
            }
        }
    }
}

/// One slot and the tasks assigned to it.
struct SlotLane {
    slot: usize,
    /// Task indices assigned to this slot, in dispatch order.
    indices: Vec<usize>,
    tasks: Arc<[DownloadTask]>,
    client: HttpClient,
    policy: Arc<RequestPolicy>,
    aggregator: Arc<ProgressAggregator>,
    cancel: CancellationToken,
}

impl SlotLane {
    async fn run(self) {
        for (position, &index) in self.indices.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let remaining = self.indices.len() - position;
                info!(slot = self.slot, remaining, "run cancelled, not dispatching");
                self.aggregator.record_skipped(remaining);
                return;
            }

            let task = self.tasks[index].clone();
            let unit = FetchUnit {
                slot: self.slot,
                task: task.clone(),
                client: self.client.clone(),
                policy: Arc::clone(&self.policy),
                aggregator: Arc::clone(&self.aggregator),
            };

            // Spawned separately so a panic surfaces here as a JoinError.
            match tokio::spawn(unit.run()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    self.aggregator
                        .record_unhandled(self.slot, &task, &e.to_string());
                }
                Err(e) => {
                    self.aggregator
                        .record_unhandled(self.slot, &task, &join_error_detail(e));
                }
            }
        }
    }
}

fn join_error_detail(error: JoinError) -> String {
    if error.is_panic() {
        format!("worker panicked: {}", panic_message(&*error.into_panic()))
    } else {
        error.to_string()
    }
}

fn panic_message<'a>(payload: &'a (dyn Any + Send + 'static)) -> &'a str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
