//! Shared value types for the Tracescope telemetry store.
//!
//! This crate holds the small value types that cross the boundary between
//! the trace store and the plotting layer. Types defined here flow
//! downstream to `TypeScript` via `ts-rs` for the viewer dashboard.
//!
//! # Modules
//!
//! - [`vector`] -- [`NumericVector`], the fixed-length sample value with
//!   element-wise arithmetic and a dot product.
//! - [`events`] -- [`TraceEvent`], the notifications emitted by the store.
//! - [`line`] -- [`LinePoint`], a single `(time, value)` plot sample.

pub mod events;
pub mod line;
pub mod vector;

// Re-export all public types at crate root for convenience.
pub use events::TraceEvent;
pub use line::LinePoint;
pub use vector::{NumericVector, Operand, VectorError};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the viewer dashboard.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::vector::NumericVector::export_all();
        let _ = crate::events::TraceEvent::export_all();
        let _ = crate::line::LinePoint::export_all();
    }
}
