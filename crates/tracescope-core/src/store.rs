//! The sliding-window trace store.
//!
//! [`TraceStore`] holds two parallel buffers, raw timesteps and their
//! derived records, plus a registry of series caches keyed by
//! `(field name, component index)`. A driver runs one cycle per tick:
//!
//! ```text
//! begin_timestep(time, max_size)  -> push, then evict from the front
//! record(name, value)*            -> populate the open timestep
//! end_timestep()                  -> derive, append to every cache, notify
//! ```
//!
//! # Invariants
//!
//! - Both buffers always have the same length; index `i` of one belongs to
//!   index `i` of the other.
//! - With a non-zero `max_size`, at most `max_size` timesteps are retained
//!   after `begin_timestep`. Eviction removes the oldest entries first.
//! - A cache holds exactly one point per *closed* retained timestep whose
//!   record (raw first, then derived) has the cache's field with a component
//!   at the cache's index. Appends, backfills and eviction shifts all use
//!   this one rule, so caches never drift from the buffer.
//! - Field presence queries (`get_data_size`, `get_data_names`) consult only
//!   the first retained record. Under [`FieldPolicy::Strict`] raw names that
//!   record lacks are rejected. Derived names are not checked, since a
//!   derived function may only produce a field once history exists.
//! - A failing derived function never blocks the tick loop: `end_timestep`
//!   still closes the timestep.

use std::collections::{BTreeMap, VecDeque};

use tracescope_types::{NumericVector, TraceEvent, VectorError};
use tracing::{debug, trace, warn};

use crate::callback::{NoOpCallback, TraceCallback};
use crate::config::{FieldPolicy, TraceConfig};
use crate::derived::{self, DerivedFn};
use crate::error::TraceError;
use crate::record::{History, Record};
use crate::series::{LineData, SeriesCache};

/// Registered caches: field name -> component index -> cache.
type Registry<C> = BTreeMap<String, BTreeMap<usize, C>>;

/// In-memory time-series store with a bounded window and live series caches.
pub struct TraceStore<C: SeriesCache = LineData> {
    /// Raw timesteps, oldest first. The newest one may be open.
    timesteps: VecDeque<Record>,

    /// Derived records, parallel to `timesteps`.
    derived: VecDeque<Record>,

    /// Installed derived function, if any.
    derived_fn: Option<DerivedFn>,

    /// Series caches handed out by `get_line_data`.
    registry: Registry<C>,

    /// Whether the newest timestep is still accepting `record` calls.
    open: bool,

    /// Time passed to the most recent `begin_timestep`.
    current_time: f64,

    /// Key-set validation policy.
    policy: FieldPolicy,

    /// Notification sink. Taken out while it runs so it can borrow the store.
    callback: Option<Box<dyn TraceCallback<C>>>,
}

impl TraceStore<LineData> {
    /// Create an empty store with [`LineData`] caches and no callback.
    pub fn new() -> Self {
        Self::with_parts(NoOpCallback, FieldPolicy::default())
    }

    /// Create an empty store with [`LineData`] caches reporting to `callback`.
    pub fn with_callback(callback: impl TraceCallback<LineData> + 'static) -> Self {
        Self::with_parts(callback, FieldPolicy::default())
    }
}

impl Default for TraceStore<LineData> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SeriesCache + Default> TraceStore<C> {
    /// Create an empty store from its parts.
    ///
    /// Construction performs a silent reset: no [`TraceEvent::Cleared`]
    /// notification is emitted.
    pub fn with_parts(callback: impl TraceCallback<C> + 'static, policy: FieldPolicy) -> Self {
        let mut store = Self {
            timesteps: VecDeque::new(),
            derived: VecDeque::new(),
            derived_fn: None,
            registry: BTreeMap::new(),
            open: false,
            current_time: 0.0,
            policy,
            callback: Some(Box::new(callback)),
        };
        store.clear(false);
        store
    }

    /// Create an empty store using the field policy from `config`.
    pub fn from_config(config: &TraceConfig, callback: impl TraceCallback<C> + 'static) -> Self {
        Self::with_parts(callback, config.fields.policy)
    }

    /// Replace the key-set validation policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Reset buffers, derived function and cache registry to empty.
    ///
    /// Emits [`TraceEvent::Cleared`] when `notify` is true.
    pub fn clear(&mut self, notify: bool) {
        let dropped = self.timesteps.len();
        self.timesteps.clear();
        self.derived.clear();
        self.derived_fn = None;
        self.registry.clear();
        self.open = false;
        self.current_time = 0.0;

        if notify {
            debug!(dropped, "trace store cleared");
            self.emit(TraceEvent::Cleared);
        }
    }

    /// Open a new timestep at `time` and enforce the window bound.
    ///
    /// The new timestep starts as `{time: [time]}` with an empty derived
    /// record. While more than `max_size` timesteps are retained (and
    /// `max_size` is non-zero) the oldest one is evicted and every cache
    /// holding a point for it drops its oldest point in lock-step. Several
    /// evictions can happen in one call if the bound shrank.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::TimestepAlreadyOpen`] if the previous timestep
    /// has not been closed with [`end_timestep`](Self::end_timestep).
    pub fn begin_timestep(&mut self, time: f64, max_size: usize) -> Result<(), TraceError> {
        if self.open {
            return Err(TraceError::TimestepAlreadyOpen {
                time: self.current_time,
            });
        }

        self.current_time = time;
        self.timesteps.push_back(Record::with_time(time));
        self.derived.push_back(Record::new());
        self.open = true;

        if max_size > 0 {
            while self.timesteps.len() > max_size {
                self.evict_oldest();
            }
        }
        Ok(())
    }

    /// Store `value` under `name` in the open timestep.
    ///
    /// The value is copied into a new vector; scalars become 1-element
    /// vectors. A second call with the same name overwrites the first.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::NoOpenTimestep`] outside `begin_timestep` /
    /// `end_timestep`, or [`TraceError::UnknownField`] under
    /// [`FieldPolicy::Strict`] if the first retained timestep (when it is
    /// not the open one) has no field `name`.
    pub fn record(&mut self, name: &str, value: impl Into<NumericVector>) -> Result<(), TraceError> {
        if !self.open {
            return Err(TraceError::NoOpenTimestep);
        }
        if self.policy.is_strict() && self.timesteps.len() > 1 {
            let known = self.timesteps.front().is_some_and(|first| first.contains(name));
            if !known {
                return Err(TraceError::UnknownField {
                    name: name.to_owned(),
                });
            }
        }

        let newest = self
            .timesteps
            .back_mut()
            .ok_or(TraceError::NoOpenTimestep)?;
        newest.insert(name, value);
        Ok(())
    }

    /// Close the open timestep.
    ///
    /// Runs the derived function (if any) for the newest timestep, appends
    /// the newest sample to every registered cache that has one, and emits
    /// [`TraceEvent::EndTimestep`].
    ///
    /// The timestep is closed even when the derived function fails: its
    /// derived record stays empty, caches receive only the raw samples, the
    /// event is still emitted and the failure is returned. The next
    /// `begin_timestep` always succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::NoOpenTimestep`] if no timestep is open, or
    /// [`TraceError::Derive`] if the derived function failed.
    pub fn end_timestep(&mut self) -> Result<(), TraceError> {
        if !self.open {
            return Err(TraceError::NoOpenTimestep);
        }
        let newest = self
            .timesteps
            .len()
            .checked_sub(1)
            .ok_or(TraceError::NoOpenTimestep)?;

        let computed = match &self.derived_fn {
            Some(derive) => derived::compute(derive, &self.timesteps, newest),
            None => Ok(Record::new()),
        };
        let outcome = match computed {
            Ok(output) => {
                if let Some(slot) = self.derived.back_mut() {
                    *slot = output;
                }
                Ok(())
            }
            Err(err) => {
                warn!(
                    time = self.current_time,
                    error = %err,
                    "derived function failed, timestep closed without derived data"
                );
                Err(err)
            }
        };

        self.open = false;
        self.append_newest();
        trace!(time = self.current_time, len = self.timesteps.len(), "timestep closed");
        self.emit(TraceEvent::EndTimestep);
        outcome
    }

    // -----------------------------------------------------------------------
    // Derived data
    // -----------------------------------------------------------------------

    /// Install `derive` as the derived function and recompute everything.
    ///
    /// The function is called for every closed retained timestep in order,
    /// each time with a [`History`] truncated at that timestep, exactly as
    /// in live operation. If a timestep is open its derived record is reset;
    /// it is computed when the timestep closes. Every cache whose field is
    /// not a raw field of the first retained timestep is then rebuilt from
    /// scratch, and [`TraceEvent::SetDerivedFn`] is emitted.
    ///
    /// Derived functions may add fields as history accumulates (a difference
    /// needs a previous record), so derived names are never validated
    /// against the first derived record.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Derive`] if any recomputation fails. The
    /// previous function, derived buffer and caches are then left untouched.
    pub fn set_derived_fn<F>(&mut self, derive: F) -> Result<(), TraceError>
    where
        F: Fn(&Record, &mut Record, &History<'_>) -> Result<(), VectorError> + 'static,
    {
        let derive: DerivedFn = Box::new(derive);
        let closed = self.closed_len();

        let mut recomputed = VecDeque::with_capacity(self.derived.len());
        for index in 0..closed {
            recomputed.push_back(derived::compute(&derive, &self.timesteps, index)?);
        }
        if self.open {
            recomputed.push_back(Record::new());
        }

        self.derived = recomputed;
        self.derived_fn = Some(derive);
        let refilled = self.refill_derived_caches();
        debug!(recomputed = closed, refilled, "derived function installed");
        self.emit(TraceEvent::SetDerivedFn);
        Ok(())
    }

    /// Remove the derived function and drop all derived data.
    ///
    /// Caches of derived fields are emptied. No event is emitted.
    pub fn clear_derived_fn(&mut self) {
        self.derived_fn = None;
        for record in &mut self.derived {
            record.clear();
        }
        let refilled = self.refill_derived_caches();
        debug!(refilled, "derived function removed");
    }

    /// Return whether a derived function is installed.
    pub const fn has_derived_fn(&self) -> bool {
        self.derived_fn.is_some()
    }

    // -----------------------------------------------------------------------
    // Window queries
    // -----------------------------------------------------------------------

    /// Time of the oldest retained timestep, or `0.0` if the buffer is empty.
    pub fn get_first_time(&self) -> f64 {
        self.timesteps
            .front()
            .and_then(Record::time)
            .unwrap_or_default()
    }

    /// Time of the newest retained timestep, or `0.0` if the buffer is empty.
    pub fn get_last_time(&self) -> f64 {
        self.timesteps
            .back()
            .and_then(Record::time)
            .unwrap_or_default()
    }

    /// Return whether opening one more timestep under `max_size` would
    /// evict the current oldest one.
    ///
    /// Lets callers warn dependent state before the eviction happens.
    pub fn will_evict_first_data(&self, max_size: usize) -> bool {
        max_size > 0 && self.timesteps.len() == max_size
    }

    /// Number of retained timesteps, the open one included.
    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    /// Return whether no timestep is retained.
    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }

    /// Return whether a timestep is open.
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Time passed to the most recent `begin_timestep`.
    pub const fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Retained raw timesteps, oldest first.
    pub const fn timesteps(&self) -> &VecDeque<Record> {
        &self.timesteps
    }

    /// Retained derived records, parallel to [`timesteps`](Self::timesteps).
    pub const fn derived(&self) -> &VecDeque<Record> {
        &self.derived
    }

    /// Raw timestep at buffer index `index`.
    pub fn timestep(&self, index: usize) -> Option<&Record> {
        self.timesteps.get(index)
    }

    /// Derived record at buffer index `index`.
    pub fn derived_record(&self, index: usize) -> Option<&Record> {
        self.derived.get(index)
    }

    /// Length of the vector stored under `name` in the first retained
    /// timestep, falling back to the first derived record.
    ///
    /// Returns 0 if the buffer is empty or the name is unknown.
    pub fn get_data_size(&self, name: &str) -> usize {
        let (Some(raw), Some(derived)) = (self.timesteps.front(), self.derived.front()) else {
            return 0;
        };
        raw.get(name)
            .or_else(|| derived.get(name))
            .map_or(0, NumericVector::len)
    }

    /// Field names of the first retained timestep followed by those of the
    /// first derived record, each in insertion order.
    ///
    /// Empty if the buffer is empty.
    pub fn get_data_names(&self) -> Vec<&str> {
        let (Some(raw), Some(derived)) = (self.timesteps.front(), self.derived.front()) else {
            return Vec::new();
        };
        raw.names().chain(derived.names()).collect()
    }

    // -----------------------------------------------------------------------
    // Series caches
    // -----------------------------------------------------------------------

    /// Return the cache for component `index` of field `name`.
    ///
    /// The first request creates the cache, backfills it from the retained
    /// history and registers it; from then on the store keeps it current on
    /// every append and eviction until it is released or the store cleared.
    ///
    /// Points are taken per timestep, so a field that first appears after
    /// the oldest retained timestep still gets the points it has, even
    /// though [`get_data_size`](Self::get_data_size) and
    /// [`get_data_names`](Self::get_data_names) only see the first record.
    pub fn get_line_data(&mut self, name: &str, index: usize) -> &C {
        let closed = self.closed_len();
        let timesteps = &self.timesteps;
        let derived = &self.derived;
        self.registry
            .entry(name.to_owned())
            .or_default()
            .entry(index)
            .or_insert_with(|| {
                let mut cache = C::default();
                fill(&mut cache, timesteps, derived, closed, name, index);
                debug!(field = name, index, points = cache.len(), "series cache created");
                cache
            })
    }

    /// Return the registered cache for `(name, index)` without creating one.
    pub fn line_data(&self, name: &str, index: usize) -> Option<&C> {
        self.registry.get(name).and_then(|caches| caches.get(&index))
    }

    /// Rebuild `cache` with the retained history of component `index` of
    /// field `name`.
    ///
    /// The cache is cleared, then one point is appended per closed retained
    /// timestep that has the component, in chronological order. Unknown
    /// names leave the cache empty.
    pub fn fill_line_data(&self, cache: &mut C, name: &str, index: usize) {
        fill(
            cache,
            &self.timesteps,
            &self.derived,
            self.closed_len(),
            name,
            index,
        );
    }

    /// Unregister and return the cache for `(name, index)`.
    pub fn release_line_data(&mut self, name: &str, index: usize) -> Option<C> {
        let caches = self.registry.get_mut(name)?;
        let released = caches.remove(&index);
        if caches.is_empty() {
            self.registry.remove(name);
        }
        if released.is_some() {
            debug!(field = name, index, "series cache released");
        }
        released
    }

    /// Unregister every cache of field `name`, returning them by index.
    pub fn release_field(&mut self, name: &str) -> BTreeMap<usize, C> {
        let released = self.registry.remove(name).unwrap_or_default();
        if !released.is_empty() {
            debug!(field = name, count = released.len(), "series caches released");
        }
        released
    }

    /// Number of registered caches.
    pub fn line_data_count(&self) -> usize {
        self.registry.values().map(BTreeMap::len).sum()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Number of closed timesteps (the open one excluded).
    fn closed_len(&self) -> usize {
        self.timesteps.len().saturating_sub(usize::from(self.open))
    }

    /// Drop the oldest timestep pair and shift every cache that held it.
    fn evict_oldest(&mut self) {
        let Some(raw) = self.timesteps.pop_front() else {
            return;
        };
        let derived = self.derived.pop_front().unwrap_or_default();

        for (name, caches) in &mut self.registry {
            for (&index, cache) in caches.iter_mut() {
                if sample(&raw, &derived, name, index).is_some() {
                    cache.shift_point();
                }
            }
        }
        trace!(
            evicted = raw.time(),
            retained = self.timesteps.len(),
            "oldest timestep evicted"
        );
    }

    /// Append the newest timestep's samples to every registered cache.
    fn append_newest(&mut self) {
        let (Some(raw), Some(derived)) = (self.timesteps.back(), self.derived.back()) else {
            return;
        };
        let time = raw.time().unwrap_or_default();

        for (name, caches) in &mut self.registry {
            for (&index, cache) in caches.iter_mut() {
                if let Some(value) = sample(raw, derived, name, index) {
                    cache.append_point(time, value);
                }
            }
        }
    }

    /// Rebuild every cache whose field is not a raw field of the first
    /// retained timestep. Returns the number of caches rebuilt.
    fn refill_derived_caches(&mut self) -> usize {
        let closed = self.closed_len();
        let first = self.timesteps.front();
        let mut refilled: usize = 0;

        for (name, caches) in &mut self.registry {
            if first.is_some_and(|record| record.contains(name)) {
                continue;
            }
            for (&index, cache) in caches.iter_mut() {
                fill(cache, &self.timesteps, &self.derived, closed, name, index);
                refilled = refilled.saturating_add(1);
            }
        }
        refilled
    }

    fn emit(&mut self, event: TraceEvent) {
        if let Some(mut callback) = self.callback.take() {
            callback.on_event(event, self);
            self.callback = Some(callback);
        }
    }
}

impl<C: SeriesCache + core::fmt::Debug> core::fmt::Debug for TraceStore<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TraceStore")
            .field("timesteps", &self.timesteps)
            .field("derived", &self.derived)
            .field("has_derived_fn", &self.derived_fn.is_some())
            .field("registry", &self.registry)
            .field("open", &self.open)
            .field("current_time", &self.current_time)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Component `index` of field `name` for one buffer position: the raw
/// record wins, the derived record is the fallback.
fn sample(raw: &Record, derived: &Record, name: &str, index: usize) -> Option<f64> {
    raw.get(name)
        .or_else(|| derived.get(name))
        .and_then(|value| value.get(index))
}

/// Clear `cache` and append one point per closed timestep that has the
/// requested component.
fn fill<C: SeriesCache>(
    cache: &mut C,
    timesteps: &VecDeque<Record>,
    derived: &VecDeque<Record>,
    closed: usize,
    name: &str,
    index: usize,
) {
    cache.clear();
    for (raw, derived) in timesteps.iter().zip(derived).take(closed) {
        if let Some(value) = sample(raw, derived, name, index) {
            cache.append_point(raw.time().unwrap_or_default(), value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tracescope_types::LinePoint;

    use super::*;

    /// Callback that records every event it sees.
    #[derive(Clone, Default)]
    struct EventLog(Rc<RefCell<Vec<TraceEvent>>>);

    impl TraceCallback for EventLog {
        fn on_event(&mut self, event: TraceEvent, _store: &TraceStore) {
            self.0.borrow_mut().push(event);
        }
    }

    /// Run one full tick recording `pos`.
    fn tick(store: &mut TraceStore, time: f64, pos: f64, max_size: usize) {
        store.begin_timestep(time, max_size).unwrap();
        store.record("pos", [pos]).unwrap();
        store.end_timestep().unwrap();
    }

    fn doubled(raw: &Record, out: &mut Record, _history: &History<'_>) -> Result<(), VectorError> {
        if let Some(pos) = raw.get("pos") {
            out.insert("double", pos.mul(2.0)?);
        }
        Ok(())
    }

    fn points(line: &LineData) -> Vec<(f64, f64)> {
        line.points().map(|p| (p.time, p.value)).collect()
    }

    #[test]
    fn construction_does_not_notify() {
        let log = EventLog::default();
        let _store = TraceStore::with_callback(log.clone());
        assert!(log.0.borrow().is_empty());
    }

    #[test]
    fn empty_store_defaults() {
        let store = TraceStore::new();
        assert!(store.is_empty());
        assert!(store.get_first_time().abs() < f64::EPSILON);
        assert!(store.get_last_time().abs() < f64::EPSILON);
        assert_eq!(store.get_data_size("pos"), 0);
        assert!(store.get_data_names().is_empty());
    }

    #[test]
    fn sliding_window_scenario() {
        let mut store = TraceStore::new();
        tick(&mut store, 0.0, 10.0, 3);
        tick(&mut store, 1.0, 20.0, 3);
        tick(&mut store, 2.0, 30.0, 3);
        let before = points(store.get_line_data("pos", 0));
        assert_eq!(before, [(0.0, 10.0), (1.0, 20.0), (2.0, 30.0)]);

        tick(&mut store, 3.0, 40.0, 3);

        let times: Vec<_> = store.timesteps().iter().filter_map(Record::time).collect();
        assert_eq!(times, [1.0, 2.0, 3.0]);
        assert!((store.get_first_time() - 1.0).abs() < f64::EPSILON);
        assert!((store.get_last_time() - 3.0).abs() < f64::EPSILON);
        let after = points(store.line_data("pos", 0).unwrap());
        assert_eq!(after, [(1.0, 20.0), (2.0, 30.0), (3.0, 40.0)]);
    }

    #[test]
    fn will_evict_first_data_predicts_eviction() {
        let mut store = TraceStore::new();
        tick(&mut store, 0.0, 1.0, 2);
        assert!(!store.will_evict_first_data(2));
        tick(&mut store, 1.0, 1.0, 2);
        assert!(store.will_evict_first_data(2));
        assert!(!store.will_evict_first_data(0));

        tick(&mut store, 2.0, 1.0, 2);
        assert_eq!(store.len(), 2);
        assert!((store.get_first_time() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn shrinking_bound_evicts_several_at_once() {
        let mut store = TraceStore::new();
        for t in 0_u32..5 {
            tick(&mut store, f64::from(t), f64::from(t), 0);
        }
        let _ = store.get_line_data("pos", 0);

        tick(&mut store, 5.0, 5.0, 2);

        assert_eq!(store.len(), 2);
        assert_eq!(store.derived().len(), 2);
        assert_eq!(store.line_data("pos", 0).unwrap().len(), 2);
        assert_eq!(
            store.line_data("pos", 0).unwrap().first(),
            Some(&LinePoint::new(4.0, 4.0))
        );
    }

    #[test]
    fn record_requires_open_timestep() {
        let mut store = TraceStore::new();
        assert_eq!(store.record("pos", [1.0]), Err(TraceError::NoOpenTimestep));
        assert_eq!(store.end_timestep(), Err(TraceError::NoOpenTimestep));

        store.begin_timestep(0.0, 0).unwrap();
        assert!(matches!(
            store.begin_timestep(1.0, 0),
            Err(TraceError::TimestepAlreadyOpen { .. })
        ));
    }

    #[test]
    fn record_overwrites_within_timestep() {
        let mut store = TraceStore::new();
        store.begin_timestep(0.0, 0).unwrap();
        store.record("x", [1.0, 2.0, 3.0]).unwrap();
        store.record("x", [4.0, 5.0, 6.0]).unwrap();
        store.end_timestep().unwrap();

        assert_eq!(
            store.timestep(0).unwrap().get("x"),
            Some(&NumericVector::from([4.0, 5.0, 6.0]))
        );
    }

    #[test]
    fn strict_policy_rejects_new_raw_field() {
        let mut store = TraceStore::new();
        tick(&mut store, 0.0, 1.0, 0);
        store.begin_timestep(1.0, 0).unwrap();
        assert_eq!(
            store.record("late", [1.0]),
            Err(TraceError::UnknownField {
                name: "late".to_owned()
            })
        );
    }

    #[test]
    fn permissive_policy_accepts_new_raw_field() {
        let mut store = TraceStore::new().with_policy(FieldPolicy::Permissive);
        tick(&mut store, 0.0, 1.0, 0);
        store.begin_timestep(1.0, 0).unwrap();
        assert!(store.record("late", [1.0]).is_ok());
        store.end_timestep().unwrap();

        // Invisible to first-entry queries, but its cache has the point.
        assert_eq!(store.get_data_size("late"), 0);
        assert_eq!(store.get_data_names(), ["time", "pos"]);
        assert_eq!(points(store.get_line_data("late", 0)), [(1.0, 1.0)]);
    }

    #[test]
    fn derived_data_follows_live_ticks() {
        let mut store = TraceStore::new();
        store.set_derived_fn(doubled).unwrap();
        let _ = store.get_line_data("double", 0);
        tick(&mut store, 0.0, 1.5, 0);
        tick(&mut store, 1.0, 2.5, 0);

        assert_eq!(
            points(store.line_data("double", 0).unwrap()),
            [(0.0, 3.0), (1.0, 5.0)]
        );
        assert_eq!(store.get_data_names(), ["time", "pos", "double"]);
    }

    #[test]
    fn set_derived_fn_recomputes_history_and_refills_caches() {
        let mut store = TraceStore::new();
        tick(&mut store, 0.0, 1.0, 0);
        tick(&mut store, 1.0, 2.0, 0);
        let raw_before = points(store.get_line_data("pos", 0));
        assert!(store.get_line_data("double", 0).is_empty());

        store.set_derived_fn(doubled).unwrap();

        assert_eq!(
            points(store.line_data("double", 0).unwrap()),
            [(0.0, 2.0), (1.0, 4.0)]
        );
        assert_eq!(points(store.line_data("pos", 0).unwrap()), raw_before);
    }

    #[test]
    fn set_derived_fn_while_open_skips_open_timestep() {
        let mut store = TraceStore::new();
        tick(&mut store, 0.0, 1.0, 0);
        let _ = store.get_line_data("double", 0);
        store.begin_timestep(1.0, 0).unwrap();
        store.record("pos", [2.0]).unwrap();

        store.set_derived_fn(doubled).unwrap();
        assert_eq!(store.line_data("double", 0).unwrap().len(), 1);
        assert!(store.derived_record(1).unwrap().is_empty());

        store.end_timestep().unwrap();
        assert_eq!(
            points(store.line_data("double", 0).unwrap()),
            [(0.0, 2.0), (1.0, 4.0)]
        );
    }

    #[test]
    fn scalar_derived_output_is_promoted() {
        let mut store = TraceStore::new();
        store
            .set_derived_fn(|raw, out, _history| {
                out.insert("sum", raw.get("pos").map_or(0.0, |v| v.iter().sum()));
                Ok(())
            })
            .unwrap();
        tick(&mut store, 0.0, 4.0, 0);

        assert_eq!(store.get_data_size("sum"), 1);
        assert_eq!(
            store.derived_record(0).unwrap().get("sum"),
            Some(&NumericVector::from([4.0]))
        );
    }

    #[test]
    fn failed_end_timestep_still_closes_timestep() {
        let log = EventLog::default();
        let mut store = TraceStore::with_callback(log.clone());
        store
            .set_derived_fn(|raw, out, _history| {
                let pos = raw.get("pos").cloned().unwrap_or_default();
                out.insert("bad", pos.add(&NumericVector::from([1.0, 1.0]))?);
                Ok(())
            })
            .unwrap();
        let _ = store.get_line_data("pos", 0);
        let _ = store.get_line_data("bad", 0);
        store.begin_timestep(0.0, 0).unwrap();
        store.record("pos", [1.0]).unwrap();

        let result = store.end_timestep();
        assert!(matches!(result, Err(TraceError::Derive { index: 0, .. })));
        assert!(!store.is_open());
        assert!(store.derived_record(0).unwrap().is_empty());
        assert_eq!(points(store.line_data("pos", 0).unwrap()), [(0.0, 1.0)]);
        assert!(store.line_data("bad", 0).unwrap().is_empty());
        assert_eq!(
            *log.0.borrow(),
            [TraceEvent::SetDerivedFn, TraceEvent::EndTimestep]
        );

        assert!(store.begin_timestep(1.0, 0).is_ok());
        store.record("pos", [2.0]).unwrap();
        assert!(store.end_timestep().is_err());
        assert!(!store.is_open());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn failed_set_derived_fn_keeps_previous_state() {
        let mut store = TraceStore::new();
        store.set_derived_fn(doubled).unwrap();
        tick(&mut store, 0.0, 1.0, 0);
        tick(&mut store, 1.0, 2.0, 0);

        let result = store.set_derived_fn(|raw, out, history| {
            let pos = raw.get("pos").cloned().unwrap_or_default();
            if history.index() == 1 {
                out.insert("bad", pos.add(&NumericVector::from([1.0, 1.0]))?);
            }
            out.insert("double", pos);
            Ok(())
        });

        assert!(matches!(result, Err(TraceError::Derive { index: 1, .. })));
        assert_eq!(
            store.derived_record(1).unwrap().get("double"),
            Some(&NumericVector::from([4.0]))
        );
    }

    #[test]
    fn clear_resets_and_notifies() {
        let log = EventLog::default();
        let mut store = TraceStore::with_callback(log.clone());
        store.set_derived_fn(doubled).unwrap();
        tick(&mut store, 0.0, 1.0, 0);
        let _ = store.get_line_data("pos", 0);

        store.clear(true);

        assert!(store.is_empty());
        assert!(!store.has_derived_fn());
        assert_eq!(store.line_data_count(), 0);
        assert_eq!(
            *log.0.borrow(),
            [
                TraceEvent::SetDerivedFn,
                TraceEvent::EndTimestep,
                TraceEvent::Cleared
            ]
        );
    }

    #[test]
    fn silent_clear_does_not_notify() {
        let log = EventLog::default();
        let mut store = TraceStore::with_callback(log.clone());
        store.clear(false);
        assert!(log.0.borrow().is_empty());
    }

    #[test]
    fn release_unregisters_cache() {
        let mut store = TraceStore::new();
        tick(&mut store, 0.0, 1.0, 0);
        let _ = store.get_line_data("pos", 0);
        let _ = store.get_line_data("time", 0);
        assert_eq!(store.line_data_count(), 2);

        let released = store.release_line_data("pos", 0).unwrap();
        assert_eq!(released.len(), 1);
        assert!(store.line_data("pos", 0).is_none());
        assert!(store.release_line_data("pos", 0).is_none());

        tick(&mut store, 1.0, 2.0, 0);
        assert_eq!(released.len(), 1);
        assert_eq!(store.release_field("time").len(), 1);
        assert_eq!(store.line_data_count(), 0);
    }

    #[test]
    fn fill_line_data_ignores_unknown_names() {
        let mut store = TraceStore::new();
        tick(&mut store, 0.0, 1.0, 0);
        let mut line = LineData::new();
        line.append_point(9.0, 9.0);

        store.fill_line_data(&mut line, "missing", 0);
        assert!(line.is_empty());

        store.fill_line_data(&mut line, "pos", 0);
        assert_eq!(points(&line), [(0.0, 1.0)]);
    }
}
