//! Plot samples.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single `(time, value)` sample on a plot line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LinePoint {
    /// Simulation time of the sample.
    pub time: f64,
    /// Sampled component value.
    pub value: f64,
}

impl LinePoint {
    /// Create a new sample.
    pub const fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}
