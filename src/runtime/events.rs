//! Runtime event stream payloads.

use crate::types::{OpSeq, VisitorId};

/// Events emitted from the single-writer session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    /// The roster was replaced by an import.
    RosterImported {
        /// Number of installed visitors.
        count: usize,
    },
    /// A pre-registered visitor checked in.
    CheckedIn {
        /// Visitor id.
        id: VisitorId,
    },
    /// A walk-in was registered.
    RegisteredOnSite {
        /// New visitor id.
        id: VisitorId,
    },
    /// A visitor's registration fields changed.
    VisitorUpdated {
        /// Visitor id.
        id: VisitorId,
    },
    /// A pre-registered visitor's attendance was cleared.
    AttendanceReset {
        /// Visitor id.
        id: VisitorId,
    },
    /// An on-site visitor was deleted.
    VisitorRemoved {
        /// Visitor id.
        id: VisitorId,
    },
    /// Event metadata changed.
    EventUpdated,
    /// The event was closed.
    EventClosed,
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
