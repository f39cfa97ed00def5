//! All events known to one organizer, one [`RosterStore`] each.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    core::store::{RosterStore, StoreError},
    event::{EventDraft, EventInfo},
    op::StoredOp,
    types::{EventId, EventStatus},
    visitor::{RosterRow, ValidationError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("upload a visitor roster before creating the event")]
    EmptyRoster,
    #[error("event {0} not found")]
    EventNotFound(EventId),
}

#[derive(Debug, Default)]
pub struct EventCatalog {
    stores: BTreeMap<EventId, RosterStore>,
    next_event_id: EventId,
}

impl EventCatalog {
    pub fn new() -> Self {
        Self {
            next_event_id: 1,
            ..Self::default()
        }
    }

    pub fn from_stores(stores: impl IntoIterator<Item = RosterStore>) -> Self {
        let mut catalog = Self::new();
        for store in stores {
            catalog.next_event_id = catalog.next_event_id.max(store.event_id().saturating_add(1));
            catalog.stores.insert(store.event_id(), store);
        }
        catalog
    }

    /// Creates an event and installs its initial roster. Nothing is kept on failure.
    pub fn create_event(&mut self, draft: EventDraft, rows: Vec<RosterRow>) -> Result<EventId, CatalogError> {
        draft.validate()?;
        if rows.is_empty() {
            return Err(CatalogError::EmptyRoster);
        }

        let id = self.next_event_id;
        let (mut store, _) = RosterStore::create(id, draft)?;
        store.import_roster(rows)?;

        self.next_event_id += 1;
        self.stores.insert(id, store);
        Ok(id)
    }

    pub fn get(&self, id: EventId) -> Option<&RosterStore> {
        self.stores.get(&id)
    }

    pub fn get_mut(&mut self, id: EventId) -> Option<&mut RosterStore> {
        self.stores.get_mut(&id)
    }

    pub fn require(&self, id: EventId) -> Result<&RosterStore, CatalogError> {
        self.get(id).ok_or(CatalogError::EventNotFound(id))
    }

    pub fn require_mut(&mut self, id: EventId) -> Result<&mut RosterStore, CatalogError> {
        self.get_mut(id).ok_or(CatalogError::EventNotFound(id))
    }

    /// Stores in event id order.
    pub fn stores(&self) -> impl Iterator<Item = &RosterStore> {
        self.stores.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &EventInfo> {
        self.stores.values().map(RosterStore::event)
    }

    pub fn closed_events(&self) -> Vec<&EventInfo> {
        self.events().filter(|e| e.is_closed).collect()
    }

    pub fn open_events(&self) -> Vec<&EventInfo> {
        self.events().filter(|e| !e.is_closed).collect()
    }

    /// Events scheduled on `date`, for the calendar view.
    pub fn events_on(&self, date: NaiveDate) -> Vec<&EventInfo> {
        self.events().filter(|e| e.date == date).collect()
    }

    pub fn status_of(&self, id: EventId, today: NaiveDate) -> Option<EventStatus> {
        self.get(id).map(|s| s.event().status(today))
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Collects journaled ops from every store, grouped by event.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        self.stores
            .values_mut()
            .flat_map(|s| s.drain_pending_ops())
            .collect()
    }
}
