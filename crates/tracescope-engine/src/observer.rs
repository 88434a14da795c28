//! Trace callback that reports store activity through `tracing`.
//!
//! Stands in for a plot redraw hook: every closed timestep is counted, and
//! every `report_every` ticks a progress line summarizing the window is
//! logged at info level.

use tracescope_core::{TraceCallback, TraceEvent, TraceStore};
use tracing::{debug, info, trace};

/// Callback that logs store lifecycle events.
pub struct LoggingCallback {
    report_every: u64,
    ticks: u64,
}

impl LoggingCallback {
    /// Create a callback logging a progress line every `report_every`
    /// closed timesteps. `0` disables progress lines.
    pub const fn new(report_every: u64) -> Self {
        Self {
            report_every,
            ticks: 0,
        }
    }

    fn is_report_tick(&self) -> bool {
        self.report_every > 0 && self.ticks.checked_rem(self.report_every) == Some(0)
    }
}

impl TraceCallback for LoggingCallback {
    fn on_event(&mut self, event: TraceEvent, store: &TraceStore) {
        match event {
            TraceEvent::EndTimestep => {
                self.ticks = self.ticks.saturating_add(1);
                if self.is_report_tick() {
                    info!(
                        ticks = self.ticks,
                        first_time = store.get_first_time(),
                        last_time = store.get_last_time(),
                        retained = store.len(),
                        series = store.line_data_count(),
                        "Trace window"
                    );
                } else {
                    trace!(ticks = self.ticks, time = store.get_last_time(), "Timestep closed");
                }
            }
            TraceEvent::Cleared => {
                debug!(ticks = self.ticks, "Trace store cleared");
                self.ticks = 0;
            }
            TraceEvent::SetDerivedFn => {
                info!(
                    %event,
                    fields = ?store.get_data_names(),
                    retained = store.len(),
                    "Derived function installed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_closed_timesteps_and_resets_on_clear() {
        let store = TraceStore::new();
        let mut callback = LoggingCallback::new(2);

        callback.on_event(TraceEvent::EndTimestep, &store);
        assert!(!callback.is_report_tick());
        callback.on_event(TraceEvent::EndTimestep, &store);
        assert!(callback.is_report_tick());
        callback.on_event(TraceEvent::SetDerivedFn, &store);
        assert_eq!(callback.ticks, 2);

        callback.on_event(TraceEvent::Cleared, &store);
        assert_eq!(callback.ticks, 0);
    }

    #[test]
    fn zero_interval_never_reports() {
        let store = TraceStore::new();
        let mut callback = LoggingCallback::new(0);
        for _ in 0..5 {
            callback.on_event(TraceEvent::EndTimestep, &store);
            assert!(!callback.is_report_tick());
        }
    }
}
