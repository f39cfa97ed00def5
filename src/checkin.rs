//! Name search feeding the check-in desk.
//!
//! A query either finds roster entries, each tagged with what the operator may
//! do with it, or finds nothing at all, which is the cue to register the
//! person on site. Homonyms are all returned; picking the right one is left to
//! the operator.

use thiserror::Error;

use crate::{core::store::RosterStore, visitor::Visitor};

/// Search input that cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The query was blank after trimming.
    #[error("enter a name to search")]
    EmptyQuery,
}

/// What the check-in desk may do with one search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitAction {
    /// Not yet attended; a check-in is offered.
    CheckIn,
    /// Already attended; shown but not actionable.
    AlreadyAttended,
}

/// One matching roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Snapshot of the matching visitor.
    pub visitor: Visitor,
    /// Offered action.
    pub action: HitAction,
}

/// Result of a name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Nobody on the roster matches; offer on-site registration pre-filled with `candidate`.
    NotFound {
        /// Trimmed query, used as the walk-in's name.
        candidate: String,
    },
    /// Not-yet-attended hits first, then attended ones, each in roster order.
    Matches(Vec<SearchHit>),
}

impl SearchOutcome {
    /// True when the desk should open the on-site registration form.
    pub fn prompts_registration(&self) -> bool {
        matches!(self, SearchOutcome::NotFound { .. })
    }
}

/// Case-insensitive substring search over visitor names.
pub fn search(store: &RosterStore, query: &str) -> Result<SearchOutcome, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let needle = query.to_lowercase();

    let (checked_in, pending): (Vec<&Visitor>, Vec<&Visitor>) = store
        .visitors()
        .into_iter()
        .filter(|v| v.name.to_lowercase().contains(&needle))
        .partition(|v| v.is_checked_in());

    log::debug!(
        "search {query:?}: {} pending, {} attended",
        pending.len(),
        checked_in.len()
    );

    if pending.is_empty() && checked_in.is_empty() {
        return Ok(SearchOutcome::NotFound {
            candidate: query.to_string(),
        });
    }

    let hits = pending
        .into_iter()
        .map(|v| (v, HitAction::CheckIn))
        .chain(checked_in.into_iter().map(|v| (v, HitAction::AlreadyAttended)))
        .map(|(v, action)| SearchHit {
            visitor: v.clone(),
            action,
        })
        .collect();

    Ok(SearchOutcome::Matches(hits))
}
