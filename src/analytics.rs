//! Attendance statistics and the monthly closed-event visitor report.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use hashbrown::HashMap;
use thiserror::Error;

use crate::{
    catalog::EventCatalog,
    core::store::RosterStore,
    csv::{
        AFFILIATION, CONTACT, EMAIL, NAME, POSITION,
        export::{ATTENDED, NOT_ATTENDED},
        quoted, with_bom,
    },
    types::Category,
};

/// Note written for walk-ins in the monthly report.
pub const ON_SITE_NOTE: &str = "현장등록";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("month must look like YYYY-MM, got {0:?}")]
    InvalidMonth(String),
    #[error("no closed events in {0}")]
    NoClosedEvents(String),
}

/// Headcounts for one event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttendanceStats {
    /// Every roster entry.
    pub total: usize,
    /// Pre-registered visitors who checked in.
    pub pre_registered_checked_in: usize,
    /// Walk-ins (always checked in).
    pub on_site: usize,
    /// Everyone who attended.
    pub checked_in: usize,
    /// Attendees per category.
    pub by_category: HashMap<Category, usize>,
}

/// Share of attendees by registration path, in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Composition {
    pub pre_registered_pct: u32,
    pub on_site_pct: u32,
}

impl AttendanceStats {
    pub fn of(store: &RosterStore) -> Self {
        let mut stats = Self::default();
        for v in store.visitors() {
            stats.total += 1;
            if v.is_on_site {
                stats.on_site += 1;
            }
            if v.is_checked_in() {
                stats.checked_in += 1;
                *stats.by_category.entry(v.category).or_insert(0) += 1;
                if !v.is_on_site {
                    stats.pre_registered_checked_in += 1;
                }
            }
        }
        stats
    }

    /// Percentages rounded half up; both zero when nobody attended.
    pub fn composition(&self) -> Composition {
        if self.checked_in == 0 {
            return Composition::default();
        }
        Composition {
            pre_registered_pct: percent(self.pre_registered_checked_in, self.checked_in),
            on_site_pct: percent(self.on_site, self.checked_in),
        }
    }

    pub fn category_count(&self, category: Category) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}

fn percent(part: usize, whole: usize) -> u32 {
    ((part * 200 + whole) / (whole * 2)) as u32
}

/// `YYYY-MM` months that have at least one closed event, ascending.
pub fn closed_months(catalog: &EventCatalog) -> Vec<String> {
    catalog
        .closed_events()
        .into_iter()
        .map(|e| e.month_key())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Visitors of every closed event held in `month`, one row per visitor.
pub fn monthly_report(catalog: &EventCatalog, month: &str) -> Result<String, ReportError> {
    let month = normalize_month(month)?;
    let month = month.as_str();

    let stores: Vec<&RosterStore> = catalog
        .stores()
        .filter(|s| s.is_closed() && s.event().month_key() == month)
        .collect();
    if stores.is_empty() {
        return Err(ReportError::NoClosedEvents(month.to_string()));
    }

    let header = ["행사명", NAME, AFFILIATION, POSITION, EMAIL, CONTACT, "참석여부", "비고"].join(",");
    let mut lines = vec![header];
    for store in stores {
        let event_name = quoted(&store.event().name);
        for v in store.visitors() {
            let status = if v.is_checked_in() { ATTENDED } else { NOT_ATTENDED };
            let note = if v.is_on_site { ON_SITE_NOTE } else { "" };
            lines.push(
                [
                    event_name.clone(),
                    quoted(&v.name),
                    quoted(&v.affiliation),
                    quoted(&v.position),
                    quoted(&v.email),
                    quoted(&v.contact),
                    status.to_string(),
                    note.to_string(),
                ]
                .join(","),
            );
        }
    }

    log::info!("monthly report {month}: {} rows", lines.len() - 1);
    Ok(with_bom(lines))
}

/// Parses a `YYYY-MM` month (a one-digit month is accepted) into its canonical `YYYY-MM` form.
pub fn normalize_month(month: &str) -> Result<String, ReportError> {
    let month = month.trim();
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map(|first| first.format("%Y-%m").to_string())
        .map_err(|_| ReportError::InvalidMonth(month.to_string()))
}

pub fn monthly_report_filename(month: &str) -> String {
    format!("visitor_data_{}.csv", month.trim())
}
