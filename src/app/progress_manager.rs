//! Progress UI: renders engine events as a progress bar plus log lines.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sitemirror_core::progress::{EngineEvent, EventReceiver, LogLevel, SlotState};

/// How events are presented.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RenderOptions {
    /// Draw a progress bar (stderr is an interactive terminal and not disabled).
    pub(crate) progress_bar: bool,
    /// Only error log lines are printed.
    pub(crate) quiet: bool,
    pub(crate) slot_count: usize,
}

/// Consumes the event stream until the engine closes it.
pub(crate) fn spawn_event_renderer(
    mut events: EventReceiver,
    options: RenderOptions,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut renderer = EventRenderer::new(options);
        while let Some(event) = events.recv().await {
            renderer.handle(&event);
        }
        renderer.finish();
    })
}

struct EventRenderer {
    bar: Option<ProgressBar>,
    quiet: bool,
    slots: Vec<SlotState>,
}

impl EventRenderer {
    fn new(options: RenderOptions) -> Self {
        let bar = options.progress_bar.then(|| {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        let renderer = Self {
            bar,
            quiet: options.quiet,
            slots: vec![SlotState::Idle; options.slot_count],
        };
        renderer.refresh_message();
        renderer
    }

    fn handle(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Progress { percent } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(u64::from(*percent));
                }
            }
            EngineEvent::Log { level, message } => self.print_log(*level, message),
            EngineEvent::SlotStatus { slot, state } => {
                if let Some(current) = self.slots.get_mut(*slot) {
                    *current = *state;
                }
                self.refresh_message();
            }
            // Already reported through the matching log line.
            EngineEvent::TaskFinished { .. } => {}
        }
    }

    fn busy_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|state| **state == SlotState::Busy)
            .count()
    }

    fn refresh_message(&self) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!(
                "{}/{} slots busy",
                self.busy_slots(),
                self.slots.len()
            ));
        }
    }

    fn print_log(&self, level: LogLevel, message: &str) {
        if self.quiet && level != LogLevel::Error {
            return;
        }
        let line = match level {
            LogLevel::Info => message.to_string(),
            LogLevel::Warn => format!("warning: {message}"),
            LogLevel::Error => format!("error: {message}"),
        };
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(slot_count: usize) -> EventRenderer {
        EventRenderer {
            bar: Some(ProgressBar::hidden()),
            quiet: true,
            slots: vec![SlotState::Idle; slot_count],
        }
    }

    #[test]
    fn test_progress_event_moves_bar() {
        let mut r = renderer(1);
        r.handle(&EngineEvent::Progress { percent: 42 });
        assert_eq!(r.bar.as_ref().unwrap().position(), 42);
    }

    #[test]
    fn test_slot_events_track_busy_count() {
        let mut r = renderer(3);
        r.handle(&EngineEvent::SlotStatus {
            slot: 0,
            state: SlotState::Busy,
        });
        r.handle(&EngineEvent::SlotStatus {
            slot: 2,
            state: SlotState::Busy,
        });
        assert_eq!(r.busy_slots(), 2);
        r.handle(&EngineEvent::SlotStatus {
            slot: 0,
            state: SlotState::Idle,
        });
        assert_eq!(r.busy_slots(), 1);
        assert_eq!(r.bar.as_ref().unwrap().message(), "1/3 slots busy");
    }

    #[test]
    fn test_out_of_range_slot_is_ignored() {
        let mut r = renderer(1);
        r.handle(&EngineEvent::SlotStatus {
            slot: 7,
            state: SlotState::Busy,
        });
        assert_eq!(r.busy_slots(), 0);
    }

    #[tokio::test]
    async fn test_renderer_drains_until_channel_closes() {
        let (tx, rx) = sitemirror_core::progress::event_channel();
        let handle = spawn_event_renderer(
            rx,
            RenderOptions {
                progress_bar: false,
                quiet: true,
                slot_count: 1,
            },
        );
        tx.send(EngineEvent::Progress { percent: 100 }).unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
