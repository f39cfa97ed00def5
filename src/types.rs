//! Shared primitive IDs and attendance-related enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Monotonic event identifier.
pub type EventId = u64;
/// Monotonic visitor identifier, unique within one roster.
pub type VisitorId = u64;
/// Monotonic operation sequence number, per event journal.
pub type OpSeq = u64;

/// Participant category shown on badges and in statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Regular attendee.
    #[default]
    General,
    /// Speaker or presenter.
    Speaker,
    /// Invited guest.
    Invited,
    /// Anything else.
    Other,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 4] = [
        Category::General,
        Category::Speaker,
        Category::Invited,
        Category::Other,
    ];

    /// Label used in CSV files and on screen.
    pub fn label(self) -> &'static str {
        match self {
            Category::General => "일반",
            Category::Speaker => "Speaker",
            Category::Invited => "초대",
            Category::Other => "기타",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    /// Unknown labels fall into [`Category::Other`]; blank means [`Category::General`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Category::General);
        }
        Ok(Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s))
            .unwrap_or(Category::Other))
    }
}

/// Derived event status relative to a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Explicitly closed by the organizer.
    Closed,
    /// Scheduled for the reference day.
    InProgress,
    /// Scheduled after the reference day.
    Upcoming,
    /// Scheduled before the reference day but never closed.
    Ended,
}

impl EventStatus {
    /// Status badge label.
    pub fn label(self) -> &'static str {
        match self {
            EventStatus::Closed => "마감",
            EventStatus::InProgress => "진행중",
            EventStatus::Upcoming => "예정",
            EventStatus::Ended => "종료",
        }
    }
}
