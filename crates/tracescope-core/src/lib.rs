//! Sliding-window trace store for the Tracescope telemetry viewer.
//!
//! A simulation driver feeds one [`Record`] per tick into a [`TraceStore`]
//! (`begin_timestep`, `record`, `end_timestep`). The store keeps a bounded
//! window of history, derives secondary quantities through a user-supplied
//! pure function, and keeps every requested per-series cache in lock-step
//! with the buffer as timesteps are appended and evicted.
//!
//! # Modules
//!
//! - [`store`] -- The [`TraceStore`] itself: buffers, eviction, derived
//!   recomputation, and the series cache registry.
//! - [`record`] -- [`Record`] (one timestep's field map) and [`History`],
//!   the read-only view handed to derived functions.
//! - [`derived`] -- The derived-function signature and computation helpers.
//! - [`series`] -- The [`SeriesCache`] trait and the default [`LineData`].
//! - [`callback`] -- [`TraceCallback`], the notification sink.
//! - [`config`] -- YAML configuration for the store and the engine driver.
//! - [`error`] -- [`TraceError`].

pub mod callback;
pub mod config;
pub mod derived;
pub mod error;
pub mod record;
pub mod series;
pub mod store;

pub use callback::{NoOpCallback, TraceCallback};
pub use config::{FieldPolicy, TraceConfig};
pub use derived::DerivedFn;
pub use error::TraceError;
pub use record::{History, Record, TIME_FIELD};
pub use series::{LineData, SeriesCache};
pub use store::TraceStore;

pub use tracescope_types::{LinePoint, NumericVector, TraceEvent, VectorError};
