use chrono::NaiveDate;

use rollcall::{
    analytics::{AttendanceStats, ReportError, closed_months, monthly_report},
    catalog::{CatalogError, EventCatalog},
    csv::BOM,
    event::EventDraft,
    types::{Category, EventStatus},
    visitor::{RosterRow, VisitorDraft},
};

fn row(name: &str, category: Category) -> RosterRow {
    RosterRow {
        name: name.to_string(),
        affiliation: "Acme".to_string(),
        position: "매니저".to_string(),
        email: "someone@acme.com".to_string(),
        contact: "010-1111-2222".to_string(),
        memo: None,
        category,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn walk_in(name: &str) -> VisitorDraft {
    VisitorDraft {
        name: name.to_string(),
        affiliation: "Walk \"Inc\"".to_string(),
        position: "대표".to_string(),
        email: "ceo@walk.com".to_string(),
        contact: "010-9999-9999".to_string(),
        category: Category::General,
    }
}

#[test]
fn create_event_requires_roster_and_fields() {
    let mut catalog = EventCatalog::new();

    assert_eq!(
        catalog.create_event(EventDraft::new("Summit", "박담당", date(2025, 3, 20)), Vec::new()),
        Err(CatalogError::EmptyRoster)
    );
    assert!(matches!(
        catalog.create_event(EventDraft::new("Summit", "", date(2025, 3, 20)), vec![row("김민수", Category::General)]),
        Err(CatalogError::Invalid(_))
    ));
    assert!(catalog.is_empty());
    assert!(catalog.drain_pending_ops().is_empty());

    let id = catalog
        .create_event(EventDraft::new("Summit", "박담당", date(2025, 3, 20)), vec![row("김민수", Category::General)])
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(catalog.require(id).unwrap().len(), 1);
    assert_eq!(catalog.require(7).map(|_| ()), Err(CatalogError::EventNotFound(7)));
    assert_eq!(catalog.drain_pending_ops().len(), 2);
}

#[test]
fn status_follows_close_flag_then_date() {
    let mut catalog = EventCatalog::new();
    let rows = || vec![row("김민수", Category::General)];
    let past = catalog.create_event(EventDraft::new("Past", "박담당", date(2025, 3, 1)), rows()).unwrap();
    let today = catalog.create_event(EventDraft::new("Today", "박담당", date(2025, 3, 20)), rows()).unwrap();
    let future = catalog.create_event(EventDraft::new("Future", "박담당", date(2025, 4, 1)), rows()).unwrap();
    let closed = catalog.create_event(EventDraft::new("Closed", "박담당", date(2025, 4, 2)), rows()).unwrap();
    catalog.require_mut(closed).unwrap().close().unwrap();

    let reference = date(2025, 3, 20);
    assert_eq!(catalog.status_of(past, reference), Some(EventStatus::Ended));
    assert_eq!(catalog.status_of(today, reference), Some(EventStatus::InProgress));
    assert_eq!(catalog.status_of(future, reference), Some(EventStatus::Upcoming));
    assert_eq!(catalog.status_of(closed, reference), Some(EventStatus::Closed));

    assert_eq!(catalog.events_on(reference).len(), 1);
    assert_eq!(catalog.closed_events().len(), 1);
    assert_eq!(catalog.open_events().len(), 3);
}

#[test]
fn stats_split_pre_registered_and_on_site() {
    let mut catalog = EventCatalog::new();
    let id = catalog
        .create_event(
            EventDraft::new("Summit", "박담당", date(2025, 3, 20)),
            vec![
                row("김민수", Category::Speaker),
                row("이영희", Category::General),
                row("박철수", Category::General),
            ],
        )
        .unwrap();
    let store = catalog.require_mut(id).unwrap();
    store.check_in(1).unwrap();
    store.check_in(2).unwrap();
    store.register_on_site(walk_in("최현장")).unwrap();

    let stats = AttendanceStats::of(store);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.checked_in, 3);
    assert_eq!(stats.pre_registered_checked_in, 2);
    assert_eq!(stats.on_site, 1);
    assert_eq!(stats.category_count(Category::Speaker), 1);
    assert_eq!(stats.category_count(Category::General), 2);
    assert_eq!(stats.category_count(Category::Other), 0);

    let composition = stats.composition();
    assert_eq!(composition.pre_registered_pct, 67);
    assert_eq!(composition.on_site_pct, 33);
}

#[test]
fn empty_attendance_has_zero_composition() {
    let mut catalog = EventCatalog::new();
    let id = catalog
        .create_event(EventDraft::new("Summit", "박담당", date(2025, 3, 20)), vec![row("김민수", Category::General)])
        .unwrap();
    let stats = AttendanceStats::of(catalog.require(id).unwrap());
    assert_eq!(stats.checked_in, 0);
    assert_eq!(stats.composition().pre_registered_pct, 0);
    assert_eq!(stats.composition().on_site_pct, 0);
}

#[test]
fn monthly_report_covers_closed_events_of_that_month_only() {
    let mut catalog = EventCatalog::new();
    let march = catalog
        .create_event(
            EventDraft::new("March \"Live\"", "박담당", date(2025, 3, 20)),
            vec![row("김민수", Category::General), row("이영희", Category::General)],
        )
        .unwrap();
    let open_march = catalog
        .create_event(EventDraft::new("Still open", "박담당", date(2025, 3, 21)), vec![row("박철수", Category::General)])
        .unwrap();
    let april = catalog
        .create_event(EventDraft::new("April", "박담당", date(2025, 4, 2)), vec![row("정다른", Category::General)])
        .unwrap();

    {
        let store = catalog.require_mut(march).unwrap();
        store.check_in(1).unwrap();
        store.register_on_site(walk_in("최현장")).unwrap();
        store.close().unwrap();
    }
    catalog.require_mut(april).unwrap().close().unwrap();
    assert!(!catalog.require(open_march).unwrap().is_closed());

    assert_eq!(closed_months(&catalog), vec!["2025-03".to_string(), "2025-04".to_string()]);

    let report = monthly_report(&catalog, "2025-03").unwrap();
    assert!(report.starts_with(BOM));
    let lines: Vec<&str> = report.trim_start_matches(BOM).lines().collect();
    assert_eq!(lines[0], "행사명,이름,소속,직급,이메일,연락처,참석여부,비고");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("\"March \"\"Live\"\"\",\"김민수\""));
    assert!(lines[1].ends_with(",참석,"));
    assert!(lines[2].ends_with(",미참석,"));
    assert!(lines[3].contains("\"Walk \"\"Inc\"\"\""));
    assert!(lines[3].ends_with(",참석,현장등록"));
    assert!(!report.contains("박철수"));
    assert_eq!(monthly_report(&catalog, "2025-3").unwrap(), report);

    assert_eq!(
        monthly_report(&catalog, "2025-05"),
        Err(ReportError::NoClosedEvents("2025-05".to_string()))
    );
    assert!(matches!(monthly_report(&catalog, "March"), Err(ReportError::InvalidMonth(_))));
}
