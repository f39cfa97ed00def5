//! Mutation operation model and persistence wrappers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    event::{EventInfo, EventPatch},
    types::{EventId, OpSeq, VisitorId},
    visitor::{Visitor, VisitorPatch},
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to an event's journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// First op of every journal.
    CreateEvent {
        /// Event as created.
        event: EventInfo,
    },
    /// Replace the whole roster with freshly imported visitors.
    ImportRoster {
        /// Installed visitors, ids already assigned.
        visitors: Vec<Visitor>,
    },
    /// Mark a pre-registered visitor as attended.
    CheckIn {
        /// Visitor id.
        id: VisitorId,
        /// Check-in time.
        at: DateTime<Utc>,
    },
    /// Append a walk-in visitor, already checked in.
    RegisterOnSite {
        /// Registered visitor.
        visitor: Visitor,
    },
    /// Edit a visitor's registration fields.
    PatchVisitor {
        /// Visitor id.
        id: VisitorId,
        /// Forward patch.
        patch: VisitorPatch,
    },
    /// Undo a pre-registered visitor's attendance.
    ResetCheckIn {
        /// Visitor id.
        id: VisitorId,
        /// Check-in time that was cleared.
        prev_at: DateTime<Utc>,
    },
    /// Delete an on-site visitor.
    RemoveVisitor {
        /// Visitor id.
        id: VisitorId,
    },
    /// Edit event metadata.
    PatchEvent {
        /// Forward patch.
        patch: EventPatch,
    },
    /// Freeze the event.
    Close,
}

impl Op {
    /// Numeric kind stored alongside the payload for ad-hoc SQL queries.
    pub fn kind(&self) -> i64 {
        match self {
            Op::CreateEvent { .. } => 1,
            Op::ImportRoster { .. } => 2,
            Op::CheckIn { .. } => 3,
            Op::RegisterOnSite { .. } => 4,
            Op::PatchVisitor { .. } => 5,
            Op::ResetCheckIn { .. } => 6,
            Op::RemoveVisitor { .. } => 7,
            Op::PatchEvent { .. } => 8,
            Op::Close => 9,
        }
    }

    /// Visitor touched by this op, if it targets exactly one.
    pub fn visitor_id(&self) -> Option<VisitorId> {
        match self {
            Op::CheckIn { id, .. }
            | Op::PatchVisitor { id, .. }
            | Op::ResetCheckIn { id, .. }
            | Op::RemoveVisitor { id } => Some(*id),
            Op::RegisterOnSite { visitor } => Some(visitor.id),
            Op::CreateEvent { .. } | Op::ImportRoster { .. } | Op::PatchEvent { .. } | Op::Close => None,
        }
    }
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Event whose journal this op belongs to.
    pub event_id: EventId,
    /// Monotonic operation sequence within the event.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
