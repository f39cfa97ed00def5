use chrono::NaiveDate;
use tempfile::TempDir;

use rollcall::{
    catalog::EventCatalog,
    event::EventDraft,
    persist::{OpSink, PersistError, sqlite::SqliteOpSink},
    types::Category,
    visitor::{RosterRow, VisitorDraft},
};

fn rows(prefix: &str, n: usize) -> Vec<RosterRow> {
    (0..n)
        .map(|i| RosterRow {
            name: format!("{prefix}{i}"),
            affiliation: "Acme".to_string(),
            position: "매니저".to_string(),
            email: format!("{prefix}{i}@acme.com"),
            contact: "010-1111-2222".to_string(),
            memo: None,
            category: Category::General,
        })
        .collect()
}

fn draft(name: &str, day: u32) -> EventDraft {
    EventDraft::new(name, "박담당", NaiveDate::from_ymd_opt(2025, 3, day).unwrap())
}

#[test]
fn sqlite_replay_round_trips_every_event() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("rollcall.db");

    let mut catalog = EventCatalog::new();
    let mut sink = SqliteOpSink::open(&db_path).expect("open sqlite");

    let a = catalog.create_event(draft("Summit", 20), rows("a", 3)).expect("create a");
    let b = catalog.create_event(draft("Meetup", 21), rows("b", 2)).expect("create b");
    {
        let store = catalog.require_mut(a).expect("a");
        store.check_in(2).expect("check in");
        store
            .register_on_site(VisitorDraft {
                name: "최현장".to_string(),
                affiliation: "Delta".to_string(),
                position: "팀장".to_string(),
                email: "walkin@delta.com".to_string(),
                contact: "010-0000-0000".to_string(),
                category: Category::Speaker,
            })
            .expect("register");
        store.close().expect("close");
    }
    catalog.require_mut(b).expect("b").check_in(1).expect("check in b");

    sink.append_ops(&catalog.drain_pending_ops()).expect("append");
    drop(sink);

    let reopened = SqliteOpSink::open(&db_path).expect("reopen");
    assert_eq!(reopened.event_ids().expect("ids"), vec![a, b]);
    let loaded = reopened.load_catalog().expect("load");

    for id in [a, b] {
        assert_eq!(
            loaded.require(id).expect("loaded").export_snapshot(),
            catalog.require(id).expect("orig").export_snapshot()
        );
    }
    assert!(loaded.require(a).expect("a").is_closed());
    assert!(matches!(reopened.load_store(99), Err(PersistError::UnknownEvent(99))));
}

#[test]
fn snapshot_and_compaction_preserve_replay() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("snap.db");

    let mut catalog = EventCatalog::new();
    let mut sink = SqliteOpSink::open(&db_path).expect("open sqlite");

    let id = catalog.create_event(draft("Summit", 20), rows("v", 10)).expect("create");
    for visitor in 1..=5 {
        catalog.require_mut(id).expect("store").check_in(visitor).expect("check in");
    }
    sink.append_ops(&catalog.drain_pending_ops()).expect("append");

    let store = catalog.require(id).expect("store");
    let snapshot = store.export_snapshot();
    let last_seq = store.latest_op_seq();
    assert_eq!(sink.latest_seq(id).expect("seq"), last_seq);
    sink.write_snapshot(&snapshot, last_seq).expect("snapshot");
    let removed = sink.compact_through(id, last_seq).expect("compact");
    assert_eq!(removed as u64, last_seq);

    let store = catalog.require_mut(id).expect("store");
    store.check_in(6).expect("check in after snapshot");
    sink.append_ops(&catalog.drain_pending_ops()).expect("append tail");
    drop(sink);

    let reopened = SqliteOpSink::open(&db_path).expect("reopen");
    let replayed = reopened.load_store(id).expect("replay");

    assert_eq!(replayed.export_snapshot(), catalog.require(id).expect("store").export_snapshot());
    assert_eq!(replayed.visitors().iter().filter(|v| v.is_checked_in()).count(), 6);
}
