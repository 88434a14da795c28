//! Notifications emitted by the trace store.
//!
//! The store reports exactly three lifecycle events to its registered
//! callback. The wire names are the camel-cased variant names, which is
//! what the viewer dashboard subscribes to.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A lifecycle notification emitted by the trace store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum TraceEvent {
    /// The store was reset to its empty state.
    Cleared,
    /// A timestep was closed and every registered series was updated.
    EndTimestep,
    /// A new derived function was installed and derived data recomputed.
    SetDerivedFn,
}

impl TraceEvent {
    /// Return the wire name of this event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cleared => "cleared",
            Self::EndTimestep => "endTimestep",
            Self::SetDerivedFn => "setDerivedFn",
        }
    }
}

impl core::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_display() {
        for event in [
            TraceEvent::Cleared,
            TraceEvent::EndTimestep,
            TraceEvent::SetDerivedFn,
        ] {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{event}\""));
        }
    }

    #[test]
    fn parses_wire_name() {
        let event: TraceEvent = serde_json::from_str("\"setDerivedFn\"").unwrap();
        assert_eq!(event, TraceEvent::SetDerivedFn);
    }
}
