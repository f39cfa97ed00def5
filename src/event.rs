//! Event metadata, creation drafts, edit patches, and derived status.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    types::{EventId, EventStatus},
    visitor::{ValidationError, require},
};

/// Fully materialized event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Stable event identifier.
    pub id: EventId,
    /// Event title.
    pub name: String,
    /// Organizer in charge.
    pub manager_name: String,
    /// Organizer's team.
    pub manager_affiliation: String,
    /// Day the event takes place.
    pub date: NaiveDate,
    /// Optional start time.
    pub start_time: Option<NaiveTime>,
    /// Optional end time.
    pub end_time: Option<NaiveTime>,
    /// Venue.
    pub location: String,
    /// Set once by [`crate::core::store::RosterStore::close`]; never cleared.
    pub is_closed: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl EventInfo {
    /// Derives the status badge for `today`.
    pub fn status(&self, today: NaiveDate) -> EventStatus {
        if self.is_closed {
            return EventStatus::Closed;
        }
        match self.date.cmp(&today) {
            std::cmp::Ordering::Equal => EventStatus::InProgress,
            std::cmp::Ordering::Greater => EventStatus::Upcoming,
            std::cmp::Ordering::Less => EventStatus::Ended,
        }
    }

    /// `YYYY-MM` month key used by the monthly report.
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

/// Creation payload for a new event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Event title.
    pub name: String,
    /// Organizer in charge.
    pub manager_name: String,
    /// Organizer's team.
    pub manager_affiliation: String,
    /// Day the event takes place.
    pub date: NaiveDate,
    /// Optional start time.
    pub start_time: Option<NaiveTime>,
    /// Optional end time.
    pub end_time: Option<NaiveTime>,
    /// Venue.
    pub location: String,
}

impl EventDraft {
    /// Draft with only the required fields set.
    pub fn new(name: impl Into<String>, manager_name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            manager_name: manager_name.into(),
            manager_affiliation: String::new(),
            date,
            start_time: None,
            end_time: None,
            location: String::new(),
        }
    }

    /// Checks the required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("manager_name", &self.manager_name)?;
        require("event_name", &self.name)?;
        Ok(())
    }

    pub(crate) fn into_event(self, id: EventId, created_at: DateTime<Utc>) -> EventInfo {
        EventInfo {
            id,
            name: self.name.trim().to_string(),
            manager_name: self.manager_name.trim().to_string(),
            manager_affiliation: self.manager_affiliation.trim().to_string(),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location.trim().to_string(),
            is_closed: false,
            created_at,
        }
    }
}

/// Sparse patch over the editable event fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventPatch {
    /// Optional replacement for the title.
    pub name: Option<String>,
    /// Optional replacement for the organizer.
    pub manager_name: Option<String>,
    /// Optional replacement for the organizer's team.
    pub manager_affiliation: Option<String>,
    /// Optional replacement for the date.
    pub date: Option<NaiveDate>,
    /// Optional replacement for the start time.
    pub start_time: Option<NaiveTime>,
    /// Optional replacement for the end time.
    pub end_time: Option<NaiveTime>,
    /// Optional replacement for the venue.
    pub location: Option<String>,
}

impl EventPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `event`.
    pub fn apply_to(&self, event: &mut EventInfo) {
        if let Some(v) = &self.name {
            event.name = v.trim().to_string();
        }
        if let Some(v) = &self.manager_name {
            event.manager_name = v.trim().to_string();
        }
        if let Some(v) = &self.manager_affiliation {
            event.manager_affiliation = v.trim().to_string();
        }
        if let Some(v) = self.date {
            event.date = v;
        }
        if let Some(v) = self.start_time {
            event.start_time = Some(v);
        }
        if let Some(v) = self.end_time {
            event.end_time = Some(v);
        }
        if let Some(v) = &self.location {
            event.location = v.trim().to_string();
        }
    }
}
