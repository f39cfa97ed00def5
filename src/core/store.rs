use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    event::{EventDraft, EventInfo, EventPatch},
    op::{Op, StoredOp},
    types::{EventId, OpSeq, VisitorId},
    visitor::{RosterRow, ValidationError, Visitor, VisitorDraft, VisitorPatch, require},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("visitor {0} not found")]
    VisitorNotFound(VisitorId),
    #[error("visitor {0} has already attended")]
    AlreadyCheckedIn(VisitorId),
    #[error("visitor {0} has not attended")]
    NotCheckedIn(VisitorId),
    #[error("event {0} is closed")]
    EventClosed(EventId),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("visitor {0} already exists")]
    AlreadyExists(VisitorId),
    #[error("journal does not start with a CreateEvent op")]
    MissingCreate,
    #[error("event {0} was already created")]
    AlreadyCreated(EventId),
    #[error("op for event {found} replayed into event {expected}")]
    EventMismatch { expected: EventId, found: EventId },
}

/// What [`RosterStore::cancel_attendance`] did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// On-site visitor deleted from the roster.
    Removed,
    /// Pre-registered visitor kept, attendance cleared.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    pub event: EventInfo,
    pub next_visitor_id: VisitorId,
    pub next_op_seq: OpSeq,
    pub visitors: Vec<Visitor>,
}

/// One event and its roster. Every mutation is refused once the event is closed.
#[derive(Debug)]
pub struct RosterStore {
    event: EventInfo,
    records: HashMap<VisitorId, Visitor>,
    order: Vec<VisitorId>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
    next_visitor_id: VisitorId,
}

impl RosterStore {
    /// Creates a new open event with an empty roster.
    pub fn create(id: EventId, draft: EventDraft) -> Result<(Self, StoredOp), StoreError> {
        draft.validate()?;
        let event = draft.into_event(id, Utc::now());
        let mut store = Self::empty(event.clone());
        let stored = store.record(Op::CreateEvent { event });
        log::info!("created event {id} ({})", store.event.name);
        Ok((store, stored))
    }

    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_visitor_id: snapshot.next_visitor_id,
            next_op_seq: snapshot.next_op_seq,
            ..Self::empty(snapshot.event)
        };

        for rec in snapshot.visitors {
            store.insert_record(rec)?;
        }

        Ok(store)
    }

    /// Rebuilds a store from its full journal, which must open with `CreateEvent`.
    pub fn replay(ops: impl IntoIterator<Item = StoredOp>) -> Result<Self, StoreError> {
        let mut ops = ops.into_iter();
        let first = ops.next().ok_or(StoreError::MissingCreate)?;
        let Op::CreateEvent { event } = first.op else {
            return Err(StoreError::MissingCreate);
        };

        let mut store = Self::empty(event);
        store.bump_next_seq_from(first.seq);
        for stored in ops {
            store.apply_replayed_op(stored)?;
        }
        Ok(store)
    }

    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        StoreSnapshotV1 {
            event: self.event.clone(),
            next_visitor_id: self.next_visitor_id,
            next_op_seq: self.next_op_seq,
            visitors: self.visitors().into_iter().cloned().collect(),
        }
    }

    /// Replaces the roster with `rows`, all not checked in.
    pub fn import_roster(&mut self, rows: Vec<RosterRow>) -> Result<(usize, StoredOp), StoreError> {
        self.ensure_open()?;

        let visitors: Vec<Visitor> = rows
            .into_iter()
            .map(|row| {
                let id = self.take_next_visitor_id();
                Visitor {
                    id,
                    name: row.name,
                    affiliation: row.affiliation,
                    position: row.position,
                    email: row.email,
                    contact: row.contact,
                    is_on_site: false,
                    checked_in_at: None,
                    memo: row.memo,
                    category: row.category,
                }
            })
            .collect();
        let count = visitors.len();

        let stored = self.commit(Op::ImportRoster { visitors })?;
        log::info!("event {}: imported {count} visitors", self.event.id);
        Ok((count, stored))
    }

    pub fn check_in(&mut self, id: VisitorId) -> Result<(DateTime<Utc>, StoredOp), StoreError> {
        self.check_in_at(id, Utc::now())
    }

    pub fn check_in_at(&mut self, id: VisitorId, at: DateTime<Utc>) -> Result<(DateTime<Utc>, StoredOp), StoreError> {
        self.ensure_open()?;
        let rec = self.records.get(&id).ok_or(StoreError::VisitorNotFound(id))?;
        if rec.is_checked_in() {
            log::warn!("event {}: visitor {id} ({}) already attended", self.event.id, rec.name);
            return Err(StoreError::AlreadyCheckedIn(id));
        }

        let stored = self.commit(Op::CheckIn { id, at })?;
        log::info!("event {}: checked in visitor {id}", self.event.id);
        Ok((at, stored))
    }

    pub fn register_on_site(&mut self, draft: VisitorDraft) -> Result<(VisitorId, StoredOp), StoreError> {
        self.register_on_site_at(draft, Utc::now())
    }

    /// Appends a walk-in visitor, checked in at `at`. Never merged with an existing entry.
    pub fn register_on_site_at(
        &mut self,
        draft: VisitorDraft,
        at: DateTime<Utc>,
    ) -> Result<(VisitorId, StoredOp), StoreError> {
        self.ensure_open()?;

        let mut visitor = Visitor {
            id: 0,
            name: draft.name.trim().to_string(),
            affiliation: draft.affiliation.trim().to_string(),
            position: draft.position.trim().to_string(),
            email: draft.email.trim().to_string(),
            contact: draft.contact.trim().to_string(),
            is_on_site: true,
            checked_in_at: Some(at),
            memo: None,
            category: draft.category,
        };
        visitor.validate()?;

        let id = self.take_next_visitor_id();
        visitor.id = id;
        let stored = self.commit(Op::RegisterOnSite { visitor })?;
        log::info!("event {}: registered on-site visitor {id}", self.event.id);
        Ok((id, stored))
    }

    pub fn update_visitor(&mut self, id: VisitorId, patch: VisitorPatch) -> Result<((), StoredOp), StoreError> {
        self.ensure_open()?;
        let mut preview = self.records.get(&id).cloned().ok_or(StoreError::VisitorNotFound(id))?;
        patch.apply_to(&mut preview);
        preview.validate()?;

        let stored = self.commit(Op::PatchVisitor { id, patch })?;
        log::info!("event {}: updated visitor {id}", self.event.id);
        Ok(((), stored))
    }

    /// Deletes an on-site visitor, or clears a pre-registered visitor's attendance.
    pub fn cancel_attendance(&mut self, id: VisitorId) -> Result<(Cancellation, StoredOp), StoreError> {
        self.ensure_open()?;
        let rec = self.records.get(&id).ok_or(StoreError::VisitorNotFound(id))?;

        let (outcome, op) = if rec.is_on_site {
            (Cancellation::Removed, Op::RemoveVisitor { id })
        } else {
            let prev_at = rec.checked_in_at.ok_or(StoreError::NotCheckedIn(id))?;
            (Cancellation::Reset, Op::ResetCheckIn { id, prev_at })
        };

        let stored = self.commit(op)?;
        log::info!("event {}: cancelled attendance of visitor {id} ({outcome:?})", self.event.id);
        Ok((outcome, stored))
    }

    pub fn update_event(&mut self, patch: EventPatch) -> Result<((), StoredOp), StoreError> {
        self.ensure_open()?;
        let mut preview = self.event.clone();
        patch.apply_to(&mut preview);
        require("manager_name", &preview.manager_name)?;
        require("event_name", &preview.name)?;

        let stored = self.commit(Op::PatchEvent { patch })?;
        Ok(((), stored))
    }

    /// Closes the event. There is no way back.
    pub fn close(&mut self) -> Result<((), StoredOp), StoreError> {
        self.ensure_open()?;
        let stored = self.commit(Op::Close)?;
        log::info!("event {} closed with {} visitors", self.event.id, self.order.len());
        Ok(((), stored))
    }

    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        if stored.event_id != self.event.id {
            return Err(StoreError::EventMismatch {
                expected: self.event.id,
                found: stored.event_id,
            });
        }
        self.apply(stored.op)?;
        self.bump_next_seq_from(stored.seq);
        Ok(())
    }

    pub fn event(&self) -> &EventInfo {
        &self.event
    }

    pub fn event_id(&self) -> EventId {
        self.event.id
    }

    pub fn is_closed(&self) -> bool {
        self.event.is_closed
    }

    pub fn get(&self, id: VisitorId) -> Option<&Visitor> {
        self.records.get(&id)
    }

    pub fn get_cloned(&self, id: VisitorId) -> Option<Visitor> {
        self.get(id).cloned()
    }

    /// Visitors in roster order.
    pub fn visitors(&self) -> Vec<&Visitor> {
        self.order.iter().filter_map(|id| self.records.get(id)).collect()
    }

    pub fn visitors_cloned(&self) -> Vec<Visitor> {
        self.visitors().into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ordered_ids(&self) -> &[VisitorId] {
        &self.order
    }

    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn empty(event: EventInfo) -> Self {
        Self {
            event,
            records: HashMap::new(),
            order: Vec::new(),
            pending_ops: Vec::new(),
            next_op_seq: 1,
            next_visitor_id: 1,
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.event.is_closed {
            log::warn!("event {} is closed; refusing mutation", self.event.id);
            return Err(StoreError::EventClosed(self.event.id));
        }
        Ok(())
    }

    fn commit(&mut self, op: Op) -> Result<StoredOp, StoreError> {
        self.apply(op.clone())?;
        Ok(self.record(op))
    }

    fn record(&mut self, op: Op) -> StoredOp {
        let seq = self.next_op_seq;
        self.bump_next_seq_from(seq);

        let stored = StoredOp {
            event_id: self.event.id,
            seq,
            ts_ms: now_ms(),
            op,
        };
        log::debug!("event {}: journaled op #{seq} (kind {})", self.event.id, stored.op.kind());
        self.pending_ops.push(stored.clone());
        stored
    }

    fn apply(&mut self, op: Op) -> Result<(), StoreError> {
        if self.event.is_closed {
            return Err(StoreError::EventClosed(self.event.id));
        }

        match op {
            Op::CreateEvent { .. } => return Err(StoreError::AlreadyCreated(self.event.id)),
            Op::ImportRoster { visitors } => {
                self.records.clear();
                self.order.clear();
                for rec in visitors {
                    self.insert_record(rec)?;
                }
            }
            Op::CheckIn { id, at } => {
                let rec = self.records.get_mut(&id).ok_or(StoreError::VisitorNotFound(id))?;
                if rec.is_checked_in() {
                    return Err(StoreError::AlreadyCheckedIn(id));
                }
                rec.checked_in_at = Some(at);
            }
            Op::RegisterOnSite { visitor } => {
                self.insert_record(visitor)?;
            }
            Op::PatchVisitor { id, patch } => {
                let rec = self.records.get_mut(&id).ok_or(StoreError::VisitorNotFound(id))?;
                patch.apply_to(rec);
            }
            Op::ResetCheckIn { id, .. } => {
                let rec = self.records.get_mut(&id).ok_or(StoreError::VisitorNotFound(id))?;
                if !rec.is_checked_in() {
                    return Err(StoreError::NotCheckedIn(id));
                }
                rec.checked_in_at = None;
            }
            Op::RemoveVisitor { id } => {
                self.records.remove(&id).ok_or(StoreError::VisitorNotFound(id))?;
                if let Some(pos) = self.order.iter().position(|x| *x == id) {
                    self.order.remove(pos);
                }
            }
            Op::PatchEvent { patch } => {
                patch.apply_to(&mut self.event);
            }
            Op::Close => {
                self.event.is_closed = true;
            }
        }
        Ok(())
    }

    fn insert_record(&mut self, rec: Visitor) -> Result<(), StoreError> {
        if self.records.contains_key(&rec.id) {
            return Err(StoreError::AlreadyExists(rec.id));
        }
        self.next_visitor_id = self.next_visitor_id.max(rec.id.saturating_add(1));
        self.order.push(rec.id);
        self.records.insert(rec.id, rec);
        Ok(())
    }

    fn take_next_visitor_id(&mut self) -> VisitorId {
        let id = self.next_visitor_id;
        self.next_visitor_id += 1;
        id
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
