use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{FixedOffset, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use rollcall::{
    analytics::{self, AttendanceStats},
    catalog::EventCatalog,
    checkin::{self, HitAction, SearchOutcome},
    config::Config,
    core::store::Cancellation,
    csv::{export, import},
    event::EventDraft,
    persist::{OpSink, sqlite::SqliteOpSink},
    sample,
    types::{Category, EventId, VisitorId},
    visitor::{VisitorDraft, VisitorPatch},
};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Run the attendance desk for your events")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overriding the config file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an event from a roster file
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        manager: String,
        #[arg(long, default_value = "")]
        affiliation: String,
        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start: Option<NaiveTime>,
        /// End time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        end: Option<NaiveTime>,
        #[arg(long, default_value = "")]
        location: String,
        /// Roster CSV with 이름,소속,직급,이메일,연락처 columns
        #[arg(long)]
        roster: PathBuf,
    },
    /// List events with their status
    List {
        /// Only closed events
        #[arg(long)]
        closed: bool,
        /// Only events on this date (YYYY-MM-DD)
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// Replace an event's roster
    Import { event: EventId, file: PathBuf },
    /// Search the roster by name
    Search { event: EventId, query: String },
    /// Check a visitor in
    CheckIn { event: EventId, visitor: VisitorId },
    /// Register a walk-in visitor
    Register {
        event: EventId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        affiliation: String,
        #[arg(long)]
        position: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        contact: String,
        /// 일반, Speaker, 초대 or 기타
        #[arg(long, default_value = "일반")]
        category: String,
    },
    /// Edit a visitor
    Edit {
        event: EventId,
        visitor: VisitorId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        affiliation: Option<String>,
        #[arg(long)]
        position: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        /// Empty string clears the memo
        #[arg(long)]
        memo: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Cancel a visitor's attendance
    Cancel {
        event: EventId,
        visitor: VisitorId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Close an event for good
    Close {
        event: EventId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Write the attendance report
    Export {
        event: EventId,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write a re-importable backup of the roster
    Backup {
        event: EventId,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write a blank import template
    Template {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Show attendance numbers
    Stats { event: EventId },
    /// Write the visitor report of a month's closed events
    Report {
        /// Month (YYYY-MM); lists available months when omitted
        month: Option<String>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write a sample roster
    Sample {
        #[arg(long, default_value_t = 20)]
        count: usize,
        #[arg(long)]
        no_homonyms: bool,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;
    let offset = config.display_offset()?;
    let db_path = cli.db.unwrap_or_else(|| config.database_path.clone());
    let today = Utc::now().with_timezone(&offset).date_naive();

    match &cli.command {
        Commands::Template { out } => {
            return write_file(out, export::TEMPLATE_FILENAME, &export::template_csv());
        }
        Commands::Sample {
            count,
            no_homonyms,
            out,
        } => {
            let text = sample::generate_sample_csv(*count, !*no_homonyms, &mut rand::thread_rng());
            return write_file(out, &sample::sample_filename(*count), &text);
        }
        _ => {}
    }

    let mut sink = SqliteOpSink::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let mut catalog = sink.load_catalog()?;

    let result = run(cli.command, &mut catalog, offset, today);

    let ops = catalog.drain_pending_ops();
    if !ops.is_empty() {
        sink.append_ops(&ops)?;
        sink.flush()?;
    }
    result
}

fn run(command: Commands, catalog: &mut EventCatalog, offset: FixedOffset, today: NaiveDate) -> Result<()> {
    match command {
        Commands::Create {
            name,
            manager,
            affiliation,
            date,
            start,
            end,
            location,
            roster,
        } => {
            let rows = import::import_file(&roster)?;
            let draft = EventDraft {
                name,
                manager_name: manager,
                manager_affiliation: affiliation,
                date,
                start_time: start,
                end_time: end,
                location,
            };
            let count = rows.len();
            let id = catalog.create_event(draft, rows)?;
            println!("created event {id} with {count} visitors");
        }
        Commands::List { closed, on } => {
            let events = match (closed, on) {
                (true, _) => catalog.closed_events(),
                (false, Some(date)) => catalog.events_on(date),
                (false, None) => catalog.events().collect(),
            };
            if events.is_empty() {
                println!("no events");
            }
            for e in events {
                println!(
                    "{:>4}  {}  [{}]  {}  ({})",
                    e.id,
                    e.date,
                    e.status(today).label(),
                    e.name,
                    e.manager_name
                );
            }
        }
        Commands::Import { event, file } => {
            let rows = import::import_file(&file)?;
            let (count, _) = catalog.require_mut(event)?.import_roster(rows)?;
            println!("imported {count} visitors");
        }
        Commands::Search { event, query } => {
            let store = catalog.require(event)?;
            match checkin::search(store, &query)? {
                SearchOutcome::NotFound { candidate } => {
                    println!("no visitor named {candidate:?}; register them with `rollcall register {event} --name {candidate:?} ...`");
                }
                SearchOutcome::Matches(hits) => {
                    for hit in hits {
                        let v = &hit.visitor;
                        let state = match hit.action {
                            HitAction::CheckIn => "check-in available",
                            HitAction::AlreadyAttended => "already attended",
                        };
                        println!("{:>4}  {} / {} / {}  <{}>  {state}", v.id, v.name, v.affiliation, v.position, v.email);
                    }
                }
            }
        }
        Commands::CheckIn { event, visitor } => {
            let store = catalog.require_mut(event)?;
            let (at, _) = store.check_in(visitor)?;
            let name = store.get(visitor).map(|v| v.name.clone()).unwrap_or_default();
            println!("{name} checked in at {}", export::format_checked_in_at(at, offset));
        }
        Commands::Register {
            event,
            name,
            affiliation,
            position,
            email,
            contact,
            category,
        } => {
            let draft = VisitorDraft {
                name,
                affiliation,
                position,
                email,
                contact,
                category: parse_category(&category),
            };
            let (id, _) = catalog.require_mut(event)?.register_on_site(draft)?;
            println!("registered on-site visitor {id}");
        }
        Commands::Edit {
            event,
            visitor,
            name,
            affiliation,
            position,
            email,
            contact,
            memo,
            category,
        } => {
            let patch = VisitorPatch {
                name,
                affiliation,
                position,
                email,
                contact,
                memo,
                category: category.as_deref().map(parse_category),
            };
            if patch.is_empty() {
                bail!("nothing to change");
            }
            catalog.require_mut(event)?.update_visitor(visitor, patch)?;
            println!("updated visitor {visitor}");
        }
        Commands::Cancel { event, visitor, yes } => {
            let store = catalog.require_mut(event)?;
            let name = store.get(visitor).map(|v| v.name.clone()).unwrap_or_default();
            if !yes && !confirm(&format!("Cancel the attendance of {name}?"))? {
                return Ok(());
            }
            match store.cancel_attendance(visitor)? {
                (Cancellation::Removed, _) => println!("removed on-site visitor {name}"),
                (Cancellation::Reset, _) => println!("cancelled the attendance of {name}"),
            }
        }
        Commands::Close { event, yes } => {
            let store = catalog.require_mut(event)?;
            if !yes && !confirm(&format!("Close {}? A closed event can no longer be changed.", store.event().name))? {
                return Ok(());
            }
            store.close()?;
            println!("event {event} closed");
        }
        Commands::Export { event, out } => {
            let store = catalog.require(event)?;
            let text = export::attendance_report(store, offset);
            write_file(&out, &export::attendance_filename(&store.event().name, today), &text)?;
        }
        Commands::Backup { event, out } => {
            let store = catalog.require(event)?;
            write_file(&out, &export::backup_filename(&store.event().name, today), &export::backup_csv(store))?;
        }
        Commands::Stats { event } => {
            let stats = AttendanceStats::of(catalog.require(event)?);
            let composition = stats.composition();
            println!("total:          {}", stats.total);
            println!("checked in:     {}", stats.checked_in);
            println!("pre-registered: {} ({}%)", stats.pre_registered_checked_in, composition.pre_registered_pct);
            println!("on site:        {} ({}%)", stats.on_site, composition.on_site_pct);
            for category in Category::ALL {
                println!("  {category}: {}", stats.category_count(category));
            }
        }
        Commands::Report { month, out } => match month {
            Some(month) => {
                let month = analytics::normalize_month(&month)?;
                let text = analytics::monthly_report(catalog, &month)?;
                write_file(&out, &analytics::monthly_report_filename(&month), &text)?;
            }
            None => {
                for month in analytics::closed_months(catalog) {
                    println!("{month}");
                }
            }
        },
        Commands::Template { .. } | Commands::Sample { .. } => {}
    }
    Ok(())
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

fn parse_category(s: &str) -> Category {
    s.parse().unwrap_or_default()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn write_file(dir: &Path, name: &str, content: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
