//! Derived-data computation.
//!
//! A derived function turns one raw timestep into a [`Record`] of secondary
//! quantities. It receives the raw record, an empty output record to
//! populate, and a [`History`] view of the raw buffer up to and including
//! the current index (for finite differences and the like). It must be
//! pure given those inputs: the store calls it again for every retained
//! timestep whenever a new function is installed.
//!
//! Output is computed into a fresh record and only committed by the store
//! when the function succeeds, so a failing function never leaves a
//! half-written derived record behind.

use std::collections::VecDeque;

use tracescope_types::VectorError;

use crate::error::TraceError;
use crate::record::{History, Record};

/// A boxed derived function as held by the store.
pub type DerivedFn = Box<dyn Fn(&Record, &mut Record, &History<'_>) -> Result<(), VectorError>>;

/// Run `derive` for the raw record at `index`.
///
/// Returns an empty record if `index` is outside the buffer.
///
/// # Errors
///
/// Returns [`TraceError::Derive`] if the function fails.
pub(crate) fn compute(
    derive: &DerivedFn,
    timesteps: &VecDeque<Record>,
    index: usize,
) -> Result<Record, TraceError> {
    let mut output = Record::new();
    let Some(raw) = timesteps.get(index) else {
        return Ok(output);
    };
    let history = History::new(timesteps, index);
    derive(raw, &mut output, &history).map_err(|source| TraceError::Derive { index, source })?;
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tracescope_types::NumericVector;

    use super::*;

    fn buffer() -> VecDeque<Record> {
        (0_u32..3)
            .map(|t| {
                let mut record = Record::with_time(f64::from(t));
                record.insert("x", [f64::from(t) * 10.0]);
                record
            })
            .collect()
    }

    #[test]
    fn compute_sees_history_up_to_index() {
        let derive: DerivedFn = Box::new(|raw, out, history| {
            let x = raw.get("x").cloned().unwrap_or_default();
            let dx = match history.previous().and_then(|prev| prev.get("x")) {
                Some(prev) => x.sub(prev)?,
                None => NumericVector::zeros(x.len()),
            };
            out.insert("dx", dx);
            out.insert("visible", f64::from(u32::try_from(history.len()).unwrap_or(0)));
            Ok(())
        });

        let timesteps = buffer();
        let first = compute(&derive, &timesteps, 0).unwrap();
        let second = compute(&derive, &timesteps, 1).unwrap();

        assert_eq!(first.get("dx"), Some(&NumericVector::from([0.0])));
        assert_eq!(second.get("dx"), Some(&NumericVector::from([10.0])));
        assert_eq!(second.get("visible"), Some(&NumericVector::from([2.0])));
    }

    #[test]
    fn compute_wraps_vector_errors() {
        let derive: DerivedFn = Box::new(|raw, out, _history| {
            let x = raw.get("x").cloned().unwrap_or_default();
            out.insert("bad", x.add(&NumericVector::from([1.0, 2.0]))?);
            Ok(())
        });

        let result = compute(&derive, &buffer(), 2);
        assert_eq!(
            result,
            Err(TraceError::Derive {
                index: 2,
                source: VectorError::LengthMismatch { left: 1, right: 2 },
            })
        );
    }
}
