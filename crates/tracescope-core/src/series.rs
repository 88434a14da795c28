//! Per-series point caches consumed by the plotting layer.
//!
//! The [`TraceStore`] keeps one cache per requested `(field, component)`
//! pair and is the only writer: it appends the newest sample at the end of
//! every timestep, shifts the oldest sample off whenever a timestep is
//! evicted, and clears and rebuilds a cache when its source data changes.
//! Readers must never mutate a cache behind the store's back, otherwise the
//! cache falls out of lock-step with the buffer.
//!
//! [`LineData`] is the default cache: an ordered deque of [`LinePoint`]s.
//!
//! [`TraceStore`]: crate::TraceStore

use std::collections::VecDeque;

use serde::Serialize;
use tracescope_types::LinePoint;

/// Write interface the trace store drives on every registered cache.
pub trait SeriesCache {
    /// Drop every cached point.
    fn clear(&mut self);

    /// Append a point at the end.
    fn append_point(&mut self, time: f64, value: f64);

    /// Drop the oldest point. A no-op on an empty cache.
    fn shift_point(&mut self);

    /// Number of cached points.
    fn len(&self) -> usize;

    /// Return whether no points are cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default [`SeriesCache`]: an ordered deque of plot samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineData {
    points: VecDeque<LinePoint>,
}

impl LineData {
    /// Create an empty line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over the points, oldest first.
    pub fn points(&self) -> impl Iterator<Item = &LinePoint> {
        self.points.iter()
    }

    /// Return the oldest point.
    pub fn first(&self) -> Option<&LinePoint> {
        self.points.front()
    }

    /// Return the newest point.
    pub fn last(&self) -> Option<&LinePoint> {
        self.points.back()
    }

    /// Iterate over the sample times, oldest first.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|point| point.time)
    }

    /// Iterate over the sample values, oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|point| point.value)
    }

    /// Smallest and largest finite value, for axis scaling.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values()
            .filter(|value| value.is_finite())
            .fold(None, |range, value| match range {
                None => Some((value, value)),
                Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
            })
    }
}

impl SeriesCache for LineData {
    fn clear(&mut self) {
        self.points.clear();
    }

    fn append_point(&mut self, time: f64, value: f64) {
        self.points.push_back(LinePoint::new(time, value));
    }

    fn shift_point(&mut self) {
        self.points.pop_front();
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn append_then_shift_drops_oldest() {
        let mut line = LineData::new();
        line.append_point(0.0, 10.0);
        line.append_point(1.0, 20.0);
        line.shift_point();

        assert_eq!(line.len(), 1);
        assert_eq!(line.first(), Some(&LinePoint::new(1.0, 20.0)));
    }

    #[test]
    fn shift_on_empty_is_noop() {
        let mut line = LineData::new();
        line.shift_point();
        assert!(line.is_empty());
    }

    #[test]
    fn value_range_skips_non_finite() {
        let mut line = LineData::new();
        line.append_point(0.0, 3.0);
        line.append_point(1.0, f64::NAN);
        line.append_point(2.0, -1.0);
        line.append_point(3.0, f64::INFINITY);

        assert_eq!(line.value_range(), Some((-1.0, 3.0)));
        assert_eq!(LineData::new().value_range(), None);
    }

    #[test]
    fn serializes_points() {
        let mut line = LineData::new();
        line.append_point(0.5, 2.0);
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["points"][0]["time"], 0.5);
        assert_eq!(json["points"][0]["value"], 2.0);
    }
}
