use chrono::{NaiveDate, TimeZone, Utc};

use rollcall::{
    core::store::{Cancellation, RosterStore, StoreError},
    event::{EventDraft, EventPatch},
    op::Op,
    types::Category,
    visitor::{RosterRow, ValidationError, VisitorDraft, VisitorPatch},
};

fn row(name: &str, affiliation: &str) -> RosterRow {
    RosterRow {
        name: name.to_string(),
        affiliation: affiliation.to_string(),
        position: "매니저".to_string(),
        email: format!("{}@example.com", affiliation.to_lowercase()),
        contact: "010-1111-2222".to_string(),
        memo: None,
        category: Category::General,
    }
}

fn walk_in(name: &str) -> VisitorDraft {
    VisitorDraft {
        name: name.to_string(),
        affiliation: "Acme".to_string(),
        position: "Engineer".to_string(),
        email: "walkin@acme.com".to_string(),
        contact: "010-9999-0000".to_string(),
        category: Category::Invited,
    }
}

fn store_with(rows: Vec<RosterRow>) -> RosterStore {
    let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
    let (mut store, _) = RosterStore::create(1, EventDraft::new("2025 Tech Summit", "박담당", date)).unwrap();
    store.import_roster(rows).unwrap();
    store
}

#[test]
fn import_assigns_ids_in_roster_order_and_journals_ops() {
    let mut store = store_with(vec![row("김민수", "Acme"), row("이영희", "Beta"), row("김민지", "Gamma")]);

    assert_eq!(store.ordered_ids(), &[1, 2, 3]);
    assert!(store.visitors().iter().all(|v| !v.is_checked_in() && !v.is_on_site));

    let ops = store.drain_pending_ops();
    assert_eq!(ops.len(), 2);
    assert!(matches!(ops[0].op, Op::CreateEvent { .. }));
    assert!(matches!(ops[1].op, Op::ImportRoster { .. }));
    assert_eq!((ops[0].seq, ops[1].seq), (1, 2));
    assert!(store.drain_pending_ops().is_empty());
}

#[test]
fn reimport_replaces_the_whole_roster() {
    let mut store = store_with(vec![row("김민수", "Acme")]);
    store.check_in(1).unwrap();
    store.register_on_site(walk_in("최현장")).unwrap();

    let (count, _) = store.import_roster(vec![row("박새로", "Delta"), row("정다른", "Echo")]).unwrap();

    assert_eq!(count, 2);
    let names: Vec<_> = store.visitors().iter().map(|v| v.name.clone()).collect();
    assert_eq!(names, vec!["박새로", "정다른"]);
    assert!(store.visitors().iter().all(|v| !v.is_checked_in()));
    assert!(store.ordered_ids().iter().all(|id| *id > 2));
}

#[test]
fn check_in_sets_timestamp_once() {
    let mut store = store_with(vec![row("김민수", "Acme")]);
    let at = Utc.with_ymd_and_hms(2025, 3, 20, 1, 30, 0).unwrap();

    let (stamped, _) = store.check_in_at(1, at).unwrap();
    assert_eq!(stamped, at);
    assert_eq!(store.get(1).unwrap().checked_in_at, Some(at));

    let later = Utc.with_ymd_and_hms(2025, 3, 20, 2, 0, 0).unwrap();
    assert_eq!(store.check_in_at(1, later), Err(StoreError::AlreadyCheckedIn(1)));
    assert_eq!(store.get(1).unwrap().checked_in_at, Some(at));
}

#[test]
fn check_in_unknown_visitor_fails() {
    let mut store = store_with(vec![row("김민수", "Acme")]);
    assert_eq!(store.check_in(42).map(|_| ()), Err(StoreError::VisitorNotFound(42)));
}

#[test]
fn on_site_registration_appends_checked_in_visitor() {
    let mut store = store_with(vec![row("김민수", "Acme")]);

    let (id, _) = store.register_on_site(walk_in("김민수")).unwrap();

    assert_eq!(id, 2);
    assert_eq!(store.len(), 2);
    let v = store.get(id).unwrap();
    assert!(v.is_on_site);
    assert!(v.is_checked_in());
    assert_eq!(v.category, Category::Invited);
    assert!(!store.get(1).unwrap().is_checked_in());
}

#[test]
fn on_site_registration_requires_every_field() {
    let mut store = store_with(vec![row("김민수", "Acme")]);

    let missing = VisitorDraft {
        position: "  ".to_string(),
        ..walk_in("최현장")
    };
    assert_eq!(
        store.register_on_site(missing).map(|_| ()),
        Err(StoreError::Invalid(ValidationError::MissingField("position")))
    );

    let bad_email = VisitorDraft {
        email: "not-an-email".to_string(),
        ..walk_in("최현장")
    };
    assert!(matches!(
        store.register_on_site(bad_email),
        Err(StoreError::Invalid(ValidationError::MalformedEmail(_)))
    ));
    assert_eq!(store.len(), 1);
}

#[test]
fn cancel_resets_pre_registered_and_removes_on_site() {
    let mut store = store_with(vec![row("김민수", "Acme")]);
    store.check_in(1).unwrap();
    let (walk_in_id, _) = store.register_on_site(walk_in("최현장")).unwrap();

    let (outcome, _) = store.cancel_attendance(1).unwrap();
    assert_eq!(outcome, Cancellation::Reset);
    assert!(!store.get(1).unwrap().is_checked_in());

    let (outcome, _) = store.cancel_attendance(walk_in_id).unwrap();
    assert_eq!(outcome, Cancellation::Removed);
    assert!(store.get(walk_in_id).is_none());
    assert_eq!(store.ordered_ids(), &[1]);

    assert_eq!(store.cancel_attendance(1).map(|_| ()), Err(StoreError::NotCheckedIn(1)));
}

#[test]
fn visitor_edit_keeps_attendance_and_clears_memo() {
    let mut store = store_with(vec![RosterRow {
        memo: Some("VIP".to_string()),
        ..row("김민수", "Acme")
    }]);
    store.check_in(1).unwrap();

    store
        .update_visitor(
            1,
            VisitorPatch {
                affiliation: Some(" Beta ".to_string()),
                memo: Some(String::new()),
                ..VisitorPatch::default()
            },
        )
        .unwrap();

    let v = store.get(1).unwrap();
    assert_eq!(v.affiliation, "Beta");
    assert_eq!(v.memo, None);
    assert!(v.is_checked_in());

    let err = store.update_visitor(
        1,
        VisitorPatch {
            email: Some("broken".to_string()),
            ..VisitorPatch::default()
        },
    );
    assert!(matches!(err, Err(StoreError::Invalid(ValidationError::MalformedEmail(_)))));
    assert_eq!(store.get(1).unwrap().email, "acme@example.com");
}

#[test]
fn event_edit_requires_manager_and_name() {
    let mut store = store_with(vec![row("김민수", "Acme")]);

    store
        .update_event(EventPatch {
            location: Some("코엑스 Hall B".to_string()),
            ..EventPatch::default()
        })
        .unwrap();
    assert_eq!(store.event().location, "코엑스 Hall B");

    let err = store.update_event(EventPatch {
        manager_name: Some(" ".to_string()),
        ..EventPatch::default()
    });
    assert!(matches!(err, Err(StoreError::Invalid(ValidationError::MissingField(_)))));
    assert_eq!(store.event().manager_name, "박담당");
}

#[test]
fn closed_event_refuses_every_mutation() {
    let mut store = store_with(vec![row("김민수", "Acme"), row("이영희", "Beta")]);
    store.check_in(1).unwrap();
    store.close().unwrap();
    assert!(store.is_closed());

    let before = store.export_snapshot();
    let closed = Err(StoreError::EventClosed(1));

    assert_eq!(store.check_in(2).map(|_| ()), closed);
    assert_eq!(store.register_on_site(walk_in("최현장")).map(|_| ()), closed);
    assert_eq!(store.cancel_attendance(1).map(|_| ()), closed);
    assert_eq!(store.import_roster(vec![row("박새로", "Delta")]).map(|_| ()), closed);
    assert_eq!(store.update_visitor(1, VisitorPatch::default()).map(|_| ()), closed);
    assert_eq!(store.update_event(EventPatch::default()).map(|_| ()), closed);
    assert_eq!(store.close().map(|_| ()), closed);

    assert_eq!(store.export_snapshot(), before);
}

#[test]
fn replay_rebuilds_identical_state() {
    let mut store = store_with(vec![row("김민수", "Acme"), row("이영희", "Beta")]);
    store.check_in(2).unwrap();
    store.register_on_site(walk_in("최현장")).unwrap();
    store.cancel_attendance(2).unwrap();
    store.close().unwrap();

    let ops = store.drain_pending_ops();
    let replayed = RosterStore::replay(ops).unwrap();

    assert_eq!(replayed.export_snapshot(), store.export_snapshot());
    assert_eq!(replayed.latest_op_seq(), store.latest_op_seq());
}

#[test]
fn replay_without_create_is_refused() {
    let mut store = store_with(vec![row("김민수", "Acme")]);
    let mut ops = store.drain_pending_ops();
    ops.remove(0);

    assert_eq!(RosterStore::replay(ops).map(|_| ()), Err(StoreError::MissingCreate));
    assert_eq!(RosterStore::replay(Vec::new()).map(|_| ()), Err(StoreError::MissingCreate));
}

#[test]
fn delimiters_in_fields_are_refused() {
    let mut store = store_with(vec![row("김민수", "Acme")]);

    let comma = VisitorDraft {
        affiliation: "Walk, Inc".to_string(),
        ..walk_in("최현장")
    };
    assert_eq!(
        store.register_on_site(comma).map(|_| ()),
        Err(StoreError::Invalid(ValidationError::Delimiter("affiliation")))
    );
    assert_eq!(store.len(), 1);

    let err = store.update_visitor(
        1,
        VisitorPatch {
            memo: Some("line one\nline two".to_string()),
            ..VisitorPatch::default()
        },
    );
    assert_eq!(err.map(|_| ()), Err(StoreError::Invalid(ValidationError::Delimiter("memo"))));
    assert_eq!(store.get(1).unwrap().memo, None);
}
