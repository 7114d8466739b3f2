//! Run state aggregation and the engine → shell event stream.
//!
//! [`ProgressAggregator`] owns the only mutable state shared between slots.
//! Every mutation happens under a single mutex, and every event is sent while
//! that mutex is held, so consumers observe a consistent sequence: progress
//! values never decrease and `completed` never exceeds `total`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::download::Outcome;
use crate::mapper::DownloadTask;

/// Sending half of the event stream.
pub type EventSender = mpsc::UnboundedSender<EngineEvent>;

/// Receiving half of the event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Creates a new event stream.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Occupancy of an execution slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Idle,
    Busy,
}

/// Severity attached to a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Events emitted by the engine. Fire-and-forget; a dropped receiver is ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Percentage of tasks completed successfully, 0..=100.
    Progress { percent: u8 },
    /// Human-readable log line.
    Log { level: LogLevel, message: String },
    /// A slot switched between busy and idle.
    SlotStatus { slot: usize, state: SlotState },
    /// Structured result of one task.
    TaskFinished {
        slot: usize,
        task: DownloadTask,
        outcome: Outcome,
    },
}

/// `floor(100 * completed / total)`, and 100 for an empty run.
#[must_use]
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let completed = completed.min(total) as u128;
    let percent = completed * 100 / total as u128;
    u8::try_from(percent).unwrap_or(100)
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub http_failures: usize,
    pub transport_failures: usize,
    pub unhandled: usize,
    /// Tasks never dispatched because the run was cancelled.
    pub skipped: usize,
    pub bytes_written: u64,
    pub percent: u8,
}

impl RunSummary {
    /// Tasks that reached a terminal state other than success.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.http_failures + self.transport_failures + self.unhandled
    }

    /// Whether every task succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

#[derive(Debug)]
struct RunState {
    total: usize,
    completed: usize,
    http_failures: usize,
    transport_failures: usize,
    unhandled: usize,
    skipped: usize,
    bytes_written: u64,
    slots: Vec<SlotState>,
}

/// Thread-safe run state plus the event sender.
#[derive(Debug)]
pub struct ProgressAggregator {
    state: Mutex<RunState>,
    events: EventSender,
}

impl ProgressAggregator {
    /// Creates the aggregator. `total` is fixed for the rest of the run.
    #[must_use]
    pub fn new(total: usize, slot_count: usize, events: EventSender) -> Self {
        Self {
            state: Mutex::new(RunState {
                total,
                completed: 0,
                http_failures: 0,
                transport_failures: 0,
                unhandled: 0,
                skipped: 0,
                bytes_written: 0,
                slots: vec![SlotState::Idle; slot_count],
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: EngineEvent) {
        // The shell may have stopped listening; the run carries on headless.
        let _ = self.events.send(event);
    }

    fn emit_log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!("{message}"),
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
        self.emit(EngineEvent::Log { level, message });
    }

    /// Emits a run-level log line (not tied to a task).
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let _state = self.lock();
        self.emit_log(level, message.into());
    }

    /// Emits the current percentage.
    pub fn report_progress(&self) {
        let state = self.lock();
        self.emit(EngineEvent::Progress {
            percent: percentage(state.completed, state.total),
        });
    }

    fn set_slot(&self, slot: usize, new_state: SlotState) {
        let mut state = self.lock();
        if let Some(current) = state.slots.get_mut(slot) {
            *current = new_state;
        }
        self.emit(EngineEvent::SlotStatus {
            slot,
            state: new_state,
        });
    }

    pub fn slot_busy(&self, slot: usize) {
        self.set_slot(slot, SlotState::Busy);
    }

    pub fn slot_idle(&self, slot: usize) {
        self.set_slot(slot, SlotState::Idle);
    }

    /// Current state of `slot`, if it exists.
    #[must_use]
    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.lock().slots.get(slot).copied()
    }

    /// Records a task's terminal outcome and emits its events.
    ///
    /// Only [`Outcome::Success`] advances `completed` and emits progress.
    pub fn record_outcome(&self, slot: usize, task: &DownloadTask, outcome: Outcome) {
        let mut state = self.lock();
        let (level, message) = match &outcome {
            Outcome::Success { bytes_written } => {
                if state.completed < state.total {
                    state.completed += 1;
                }
                state.bytes_written = state.bytes_written.saturating_add(*bytes_written);
                (
                    LogLevel::Info,
                    format!(
                        "Downloaded: {} -> {}",
                        task.remote_url(),
                        task.local_path().display()
                    ),
                )
            }
            Outcome::HttpFailure { status } => {
                state.http_failures += 1;
                (
                    LogLevel::Warn,
                    format!("Failed: {} (Status {status})", task.remote_url()),
                )
            }
            Outcome::TransportFailure { detail } => {
                state.transport_failures += 1;
                (
                    LogLevel::Warn,
                    format!("Error downloading {}: {detail}", task.remote_url()),
                )
            }
        };

        let advanced = outcome.is_success();
        self.emit(EngineEvent::TaskFinished {
            slot,
            task: task.clone(),
            outcome,
        });
        self.emit_log(level, message);
        if advanced {
            self.emit(EngineEvent::Progress {
                percent: percentage(state.completed, state.total),
            });
        }
    }

    /// Records a failure that escaped a unit (local IO error, panic).
    pub fn record_unhandled(&self, slot: usize, task: &DownloadTask, detail: &str) {
        let mut state = self.lock();
        state.unhandled += 1;
        self.emit_log(
            LogLevel::Error,
            format!(
                "Unexpected error in slot {slot} for {}: {detail}",
                task.remote_url()
            ),
        );
    }

    /// Records tasks that were never dispatched.
    pub fn record_skipped(&self, count: usize) {
        self.lock().skipped += count;
    }

    /// `(completed, total)` read under the lock.
    #[must_use]
    pub fn snapshot(&self) -> (usize, usize) {
        let state = self.lock();
        (state.completed, state.total)
    }

    /// Totals so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let state = self.lock();
        RunSummary {
            total: state.total,
            completed: state.completed,
            http_failures: state.http_failures,
            transport_failures: state.transport_failures,
            unhandled: state.unhandled,
            skipped: state.skipped,
            bytes_written: state.bytes_written,
            percent: percentage(state.completed, state.total),
        }
    }
}
