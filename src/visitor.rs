//! Visitor records, on-site drafts, imported rows, and edit patches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Category, VisitorId};

/// Rejected user input. Nothing is changed when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was empty after trimming.
    #[error("required field is blank: {0}")]
    MissingField(&'static str),
    /// The email field is not shaped like `local@domain.tld`.
    #[error("malformed email address: {0:?}")]
    MalformedEmail(String),
    /// A field holds a comma or line break, which the CSV exports cannot carry.
    #[error("{0} must not contain commas or line breaks")]
    Delimiter(&'static str),
}

/// One roster entry.
///
/// Attendance is stored only as `checked_in_at`; [`Visitor::is_checked_in`]
/// is derived from it so the flag and the timestamp cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    /// Stable identifier within the roster.
    pub id: VisitorId,
    /// Display name. Never blank.
    pub name: String,
    /// Company or department.
    pub affiliation: String,
    /// Job title.
    pub position: String,
    /// Email address.
    pub email: String,
    /// Phone number or other contact.
    pub contact: String,
    /// True for walk-ins registered at the venue.
    pub is_on_site: bool,
    /// Check-in time, present iff the visitor attended.
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Free-form operator note.
    pub memo: Option<String>,
    /// Participant category.
    pub category: Category,
}

impl Visitor {
    /// Returns true when the visitor has attended.
    pub fn is_checked_in(&self) -> bool {
        self.checked_in_at.is_some()
    }

    /// Checks the fields an operator must fill in when registering or editing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("affiliation", &self.affiliation)?;
        require("position", &self.position)?;
        require("email", &self.email)?;
        require("contact", &self.contact)?;
        for (field, value) in [
            ("name", self.name.as_str()),
            ("affiliation", self.affiliation.as_str()),
            ("position", self.position.as_str()),
            ("email", self.email.as_str()),
            ("contact", self.contact.as_str()),
            ("memo", self.memo.as_deref().unwrap_or_default()),
        ] {
            reject_delimiters(field, value)?;
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::MalformedEmail(self.email.clone()));
        }
        Ok(())
    }
}

/// A parsed, not yet installed row of an imported roster.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RosterRow {
    /// Display name.
    pub name: String,
    /// Company or department.
    pub affiliation: String,
    /// Job title.
    pub position: String,
    /// Email address.
    pub email: String,
    /// Phone number or other contact.
    pub contact: String,
    /// Optional note carried over from the file.
    pub memo: Option<String>,
    /// Category column, when the file has one.
    pub category: Category,
}

/// Walk-in registration form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisitorDraft {
    /// Display name.
    pub name: String,
    /// Company or department.
    pub affiliation: String,
    /// Job title.
    pub position: String,
    /// Email address.
    pub email: String,
    /// Phone number or other contact.
    pub contact: String,
    /// Participant category.
    pub category: Category,
}

impl VisitorDraft {
    /// Starts a draft pre-filled with a name, as offered after a failed search.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Sparse patch where each `Some` field overwrites the record value.
///
/// Check-in state is deliberately absent: editing never changes attendance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisitorPatch {
    /// Optional replacement for the name.
    pub name: Option<String>,
    /// Optional replacement for the affiliation.
    pub affiliation: Option<String>,
    /// Optional replacement for the position.
    pub position: Option<String>,
    /// Optional replacement for the email.
    pub email: Option<String>,
    /// Optional replacement for the contact.
    pub contact: Option<String>,
    /// Optional replacement for the memo; an empty string clears it.
    pub memo: Option<String>,
    /// Optional replacement for the category.
    pub category: Option<Category>,
}

impl VisitorPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `rec`, trimming text fields.
    pub fn apply_to(&self, rec: &mut Visitor) {
        if let Some(v) = &self.name {
            rec.name = v.trim().to_string();
        }
        if let Some(v) = &self.affiliation {
            rec.affiliation = v.trim().to_string();
        }
        if let Some(v) = &self.position {
            rec.position = v.trim().to_string();
        }
        if let Some(v) = &self.email {
            rec.email = v.trim().to_string();
        }
        if let Some(v) = &self.contact {
            rec.contact = v.trim().to_string();
        }
        if let Some(v) = &self.memo {
            rec.memo = non_blank(v);
        }
        if let Some(v) = self.category {
            rec.category = v;
        }
    }
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn reject_delimiters(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.contains([',', '\n', '\r']) {
        return Err(ValidationError::Delimiter(field));
    }
    Ok(())
}

pub(crate) fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Loose `local@domain.tld` shape check, the same bar a browser email input applies.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
