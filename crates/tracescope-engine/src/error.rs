//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the tick loop.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tracescope_core::config::ConfigError,
    },

    /// A trace store operation failed.
    #[error("trace error: {source}")]
    Trace {
        /// The underlying store error.
        #[from]
        source: tracescope_core::TraceError,
    },

    /// Vector arithmetic in the simulation step failed.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying vector error.
        #[from]
        source: tracescope_types::VectorError,
    },

    /// Serializing a series for output failed.
    #[error("serialization error: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
