//! Notification sink for store lifecycle events.
//!
//! A single [`TraceCallback`] is registered when the store is built. It is
//! invoked synchronously with the [`TraceEvent`] and a shared reference to
//! the store after the mutation that produced the event has completed, so
//! the callback always observes a consistent store.

use tracescope_types::TraceEvent;

use crate::series::{LineData, SeriesCache};
use crate::store::TraceStore;

/// Callback invoked after `clear`, `end_timestep` and `set_derived_fn`.
///
/// Implementations can use this to trigger plot redraws, push updates to a
/// dashboard, etc. The store does not consult any return value.
pub trait TraceCallback<C: SeriesCache = LineData> {
    /// Called once per emitted event.
    fn on_event(&mut self, event: TraceEvent, store: &TraceStore<C>);
}

impl<C, F> TraceCallback<C> for F
where
    C: SeriesCache,
    F: FnMut(TraceEvent, &TraceStore<C>),
{
    fn on_event(&mut self, event: TraceEvent, store: &TraceStore<C>) {
        self(event, store);
    }
}

/// A callback that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl<C: SeriesCache> TraceCallback<C> for NoOpCallback {
    fn on_event(&mut self, _event: TraceEvent, _store: &TraceStore<C>) {}
}
