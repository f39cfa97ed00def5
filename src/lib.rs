//! Event attendance desk: roster import, check-in, on-site registration and
//! CSV reports, with an append-only SQLite journal.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::RosterStore`]:
//! ```
//! use chrono::NaiveDate;
//! use rollcall::{
//!     checkin::{search, HitAction, SearchOutcome},
//!     core::store::RosterStore,
//!     csv::import::parse_roster,
//!     event::EventDraft,
//! };
//!
//! let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
//! let (mut store, _op) = RosterStore::create(1, EventDraft::new("신제품 설명회", "이학인", date))
//!     .expect("create");
//! let rows = parse_roster("이름,소속,직급,이메일,연락처\n김민준,마케팅부,팀장,minjun@example.com,010-1234-5678")
//!     .expect("parse");
//! store.import_roster(rows).expect("import");
//!
//! let SearchOutcome::Matches(hits) = search(&store, "김민").expect("search") else {
//!     panic!("expected a match");
//! };
//! assert_eq!(hits[0].action, HitAction::CheckIn);
//! store.check_in(hits[0].visitor.id).expect("check in");
//! assert!(store.check_in(hits[0].visitor.id).is_err());
//! ```
//!
//! Runtime usage with SQLite sink:
//! ```no_run
//! use chrono::NaiveDate;
//! use rollcall::{
//!     core::store::RosterStore,
//!     event::EventDraft,
//!     persist::sqlite::SqliteOpSink,
//!     runtime::handle::{spawn_session, RuntimeConfig},
//!     visitor::VisitorDraft,
//!     types::Category,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteOpSink::open("rollcall.db").expect("open sqlite");
//! let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
//! let (store, _) = RosterStore::create(1, EventDraft::new("신제품 설명회", "이학인", date)).expect("create");
//! let handle = spawn_session(store, Some(Box::new(sink)), RuntimeConfig::default());
//! let _id = handle.register_on_site(VisitorDraft {
//!     name: "오현우".to_string(),
//!     affiliation: "연구소".to_string(),
//!     position: "과장".to_string(),
//!     email: "hyunwoo@example.com".to_string(),
//!     contact: "010-2222-3333".to_string(),
//!     category: Category::Speaker,
//! }).await.expect("register");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Attendance statistics and the monthly closed-event report.
pub mod analytics;
/// Every event of one organizer.
pub mod catalog;
/// Name search for the check-in desk.
pub mod checkin;
/// Configuration file loading.
pub mod config;
/// Core in-memory roster store.
pub mod core;
/// Roster CSV import and export.
pub mod csv;
/// Event records and lifecycle.
pub mod event;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Sample roster generation.
pub mod sample;
/// Shared primitive types and enums.
pub mod types;
/// Visitor records, drafts and patches.
pub mod visitor;
