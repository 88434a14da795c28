//! Error types for the `tracescope-core` crate.

use tracescope_types::VectorError;

/// Errors that can occur during trace store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraceError {
    /// `record` or `end_timestep` was called with no open timestep.
    #[error("no open timestep: call begin_timestep first")]
    NoOpenTimestep,

    /// `begin_timestep` was called while the previous timestep was still open.
    #[error("timestep at time {time} is still open: call end_timestep first")]
    TimestepAlreadyOpen {
        /// Time of the timestep that is still open.
        time: f64,
    },

    /// A raw field was recorded that the first retained timestep does not have.
    #[error("field {name:?} is not recorded by the first retained timestep")]
    UnknownField {
        /// The rejected field name.
        name: String,
    },

    /// The derived function failed for the timestep at `index`.
    #[error("derived function failed at buffer index {index}: {source}")]
    Derive {
        /// Buffer index of the timestep being derived.
        index: usize,
        /// The underlying vector error.
        source: VectorError,
    },
}
