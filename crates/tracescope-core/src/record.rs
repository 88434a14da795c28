//! Per-timestep field maps and the history view.
//!
//! A [`Record`] maps field names to [`NumericVector`] values in insertion
//! order. The same type backs both raw timesteps (which always carry a
//! [`TIME_FIELD`] entry) and derived records.
//!
//! [`History`] is the read-only view of the raw buffer handed to derived
//! functions. It exposes records up to and including the one being
//! derived and nothing newer, so live computation at `end_timestep` and
//! full recomputation after `set_derived_fn` see the same inputs.

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracescope_types::NumericVector;

/// Name of the field holding a timestep's time as a 1-element vector.
pub const TIME_FIELD: &str = "time";

/// An insertion-ordered map from field name to vector value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, NumericVector>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record holding only `{time: [time]}`.
    pub fn with_time(time: f64) -> Self {
        let mut record = Self::new();
        record.insert(TIME_FIELD, time);
        record
    }

    /// Return the value of the [`TIME_FIELD`] entry, if present.
    pub fn time(&self) -> Option<f64> {
        self.component(TIME_FIELD, 0)
    }

    /// Return the value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&NumericVector> {
        self.fields.get(name)
    }

    /// Return component `index` of the value stored under `name`.
    pub fn component(&self, name: &str, index: usize) -> Option<f64> {
        self.fields.get(name).and_then(|value| value.get(index))
    }

    /// Return whether a value is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Store `value` under `name`, replacing and returning any prior value.
    ///
    /// Scalars are promoted to 1-element vectors on the way in, so every
    /// stored value is vector-shaped.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<NumericVector>,
    ) -> Option<NumericVector> {
        self.fields.insert(name.into(), value.into())
    }

    /// Iterate over field names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NumericVector)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Return the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Return whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove every field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

/// Read-only view of the raw buffer, truncated at the record being derived.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    records: &'a VecDeque<Record>,
    index: usize,
}

impl<'a> History<'a> {
    pub(crate) const fn new(records: &'a VecDeque<Record>, index: usize) -> Self {
        Self { records, index }
    }

    /// Buffer index of the record being derived.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Number of visible records (the current one included).
    pub fn len(&self) -> usize {
        self.index.saturating_add(1).min(self.records.len())
    }

    /// Return whether no record is visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the record at `index`, or `None` past the current record.
    pub fn get(&self, index: usize) -> Option<&'a Record> {
        if index > self.index {
            return None;
        }
        self.records.get(index)
    }

    /// Return the record being derived.
    pub fn current(&self) -> Option<&'a Record> {
        self.records.get(self.index)
    }

    /// Return the record immediately before the current one.
    pub fn previous(&self) -> Option<&'a Record> {
        self.index
            .checked_sub(1)
            .and_then(|index| self.records.get(index))
    }

    /// Iterate over visible records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + use<'a> {
        self.records.iter().take(self.len())
    }
}
