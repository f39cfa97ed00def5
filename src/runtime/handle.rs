use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};

use crate::{
    analytics::AttendanceStats,
    checkin::{self, SearchError, SearchOutcome},
    core::store::{Cancellation, RosterStore, StoreError, StoreSnapshotV1},
    event::{EventInfo, EventPatch},
    op::{Op, StoredOp},
    persist::{OpSink, PersistError},
    types::{OpSeq, VisitorId},
    visitor::{RosterRow, Visitor, VisitorDraft, VisitorPatch},
};

use super::events::RosterEvent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("session loop is gone")]
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Write through immediately after check-ins and on-site registrations.
    pub flush_on_check_in: bool,
    pub batch_max_ops: usize,
    pub batch_max_latency_ms: u64,
    pub persist_queue_bound: usize,
    /// Mutations between automatic snapshots; 0 disables them.
    pub snapshot_every_ops: usize,
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_check_in: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 500,
            compact_after_snapshot: false,
        }
    }
}

/// Cloneable handle to one event's session loop.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<RosterEvent>,
}

enum Command {
    ImportRoster {
        rows: Vec<RosterRow>,
        resp: oneshot::Sender<Result<usize, RuntimeError>>,
    },
    CheckIn {
        id: VisitorId,
        resp: oneshot::Sender<Result<DateTime<Utc>, RuntimeError>>,
    },
    RegisterOnSite {
        draft: VisitorDraft,
        resp: oneshot::Sender<Result<VisitorId, RuntimeError>>,
    },
    UpdateVisitor {
        id: VisitorId,
        patch: VisitorPatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    CancelAttendance {
        id: VisitorId,
        resp: oneshot::Sender<Result<Cancellation, RuntimeError>>,
    },
    UpdateEvent {
        patch: EventPatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Close {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Get {
        id: VisitorId,
        resp: oneshot::Sender<Option<Visitor>>,
    },
    Search {
        query: String,
        resp: oneshot::Sender<Result<SearchOutcome, RuntimeError>>,
    },
    Roster {
        resp: oneshot::Sender<Vec<Visitor>>,
    },
    Event {
        resp: oneshot::Sender<EventInfo>,
    },
    Stats {
        resp: oneshot::Sender<AttendanceStats>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Checkpoint {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    /// Everything one command journaled, in sequence order.
    Ops(Vec<StoredOp>),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Checkpoint {
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct Session {
    store: RosterStore,
    events_tx: broadcast::Sender<RosterEvent>,
    persist_tx: Option<mpsc::Sender<PersistMsg>>,
    config: RuntimeConfig,
    ops_since_snapshot: usize,
}

/// Spawns the session loop owning `store`. All commands run one at a time, in arrival order.
pub fn spawn_session(
    mut store: RosterStore,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> SessionHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<RosterEvent>(1024);

    let (persist_tx, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        // Ops journaled before the session started go out with the first batch.
        let backlog = store.drain_pending_ops();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone(), backlog);
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    log::info!("session started for event {}", store.event_id());
    let mut session = Session {
        store,
        events_tx: events_tx.clone(),
        persist_tx,
        config,
        ops_since_snapshot: 0,
    };

    tokio::spawn(async move {
        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        if session.handle_command(cmd).await {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        match durable {
                            Some(Ok(op_seq)) => {
                                let _ = session.events_tx.send(RosterEvent::DurableUpTo { op_seq });
                            }
                            Some(Err(err)) => log::warn!("persistence failed: {err}"),
                            None => {}
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                if session.handle_command(cmd).await {
                    break;
                }
            }
        }
        log::info!("session for event {} stopped", session.store.event_id());
    });

    SessionHandle { cmd_tx, events_tx }
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn import_roster(&self, rows: Vec<RosterRow>) -> Result<usize, RuntimeError> {
        self.request(|resp| Command::ImportRoster { rows, resp }).await?
    }

    pub async fn check_in(&self, id: VisitorId) -> Result<DateTime<Utc>, RuntimeError> {
        self.request(|resp| Command::CheckIn { id, resp }).await?
    }

    pub async fn register_on_site(&self, draft: VisitorDraft) -> Result<VisitorId, RuntimeError> {
        self.request(|resp| Command::RegisterOnSite { draft, resp }).await?
    }

    pub async fn update_visitor(&self, id: VisitorId, patch: VisitorPatch) -> Result<(), RuntimeError> {
        self.request(|resp| Command::UpdateVisitor { id, patch, resp }).await?
    }

    pub async fn cancel_attendance(&self, id: VisitorId) -> Result<Cancellation, RuntimeError> {
        self.request(|resp| Command::CancelAttendance { id, resp }).await?
    }

    pub async fn update_event(&self, patch: EventPatch) -> Result<(), RuntimeError> {
        self.request(|resp| Command::UpdateEvent { patch, resp }).await?
    }

    pub async fn close(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Close { resp }).await?
    }

    pub async fn get(&self, id: VisitorId) -> Result<Option<Visitor>, RuntimeError> {
        self.request(|resp| Command::Get { id, resp }).await
    }

    pub async fn search(&self, query: impl Into<String>) -> Result<SearchOutcome, RuntimeError> {
        let query = query.into();
        self.request(|resp| Command::Search { query, resp }).await?
    }

    pub async fn roster(&self) -> Result<Vec<Visitor>, RuntimeError> {
        self.request(|resp| Command::Roster { resp }).await
    }

    pub async fn event(&self) -> Result<EventInfo, RuntimeError> {
        self.request(|resp| Command::Event { resp }).await
    }

    pub async fn stats(&self) -> Result<AttendanceStats, RuntimeError> {
        self.request(|resp| Command::Stats { resp }).await
    }

    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        self.request(|resp| Command::Flush { resp }).await?
    }

    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Checkpoint { resp }).await?
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }
}

impl Session {
    /// Returns true when the loop should stop.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::ImportRoster { rows, resp } => {
                let res = self
                    .mutate(|s| s.import_roster(rows), |count| RosterEvent::RosterImported { count: *count })
                    .await;
                let _ = resp.send(res);
            }
            Command::CheckIn { id, resp } => {
                let res = self.mutate(|s| s.check_in(id), |_| RosterEvent::CheckedIn { id }).await;
                let _ = resp.send(res);
            }
            Command::RegisterOnSite { draft, resp } => {
                let res = self
                    .mutate(|s| s.register_on_site(draft), |id| RosterEvent::RegisteredOnSite { id: *id })
                    .await;
                let _ = resp.send(res);
            }
            Command::UpdateVisitor { id, patch, resp } => {
                let res = self
                    .mutate(|s| s.update_visitor(id, patch), |_| RosterEvent::VisitorUpdated { id })
                    .await;
                let _ = resp.send(res);
            }
            Command::CancelAttendance { id, resp } => {
                let res = self
                    .mutate(
                        |s| s.cancel_attendance(id),
                        |outcome| match outcome {
                            Cancellation::Removed => RosterEvent::VisitorRemoved { id },
                            Cancellation::Reset => RosterEvent::AttendanceReset { id },
                        },
                    )
                    .await;
                let _ = resp.send(res);
            }
            Command::UpdateEvent { patch, resp } => {
                let res = self.mutate(|s| s.update_event(patch), |_| RosterEvent::EventUpdated).await;
                let _ = resp.send(res);
            }
            Command::Close { resp } => {
                let res = self.mutate(RosterStore::close, |_| RosterEvent::EventClosed).await;
                if res.is_ok() {
                    if let Err(err) = self.checkpoint().await {
                        log::warn!("snapshot after closing event {} failed: {err}", self.store.event_id());
                    }
                }
                let _ = resp.send(res);
            }
            Command::Get { id, resp } => {
                let _ = resp.send(self.store.get_cloned(id));
            }
            Command::Search { query, resp } => {
                let _ = resp.send(checkin::search(&self.store, &query).map_err(RuntimeError::from));
            }
            Command::Roster { resp } => {
                let _ = resp.send(self.store.visitors_cloned());
            }
            Command::Event { resp } => {
                let _ = resp.send(self.store.event().clone());
            }
            Command::Stats { resp } => {
                let _ = resp.send(AttendanceStats::of(&self.store));
            }
            Command::Flush { resp } => {
                let out = if let Some(tx) = &self.persist_tx {
                    let (flush_tx, flush_rx) = oneshot::channel();
                    if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                        Err(RuntimeError::ChannelClosed)
                    } else {
                        flush_rx
                            .await
                            .map_err(|_| RuntimeError::ChannelClosed)
                            .and_then(|r| r.map_err(RuntimeError::from))
                    }
                } else {
                    Ok(self.store.latest_op_seq())
                };
                let _ = resp.send(out);
            }
            Command::Checkpoint { resp } => {
                let out = self.checkpoint().await;
                let _ = resp.send(out);
            }
            Command::Shutdown { resp } => {
                let out = if let Some(tx) = &self.persist_tx {
                    let (done_tx, done_rx) = oneshot::channel();
                    if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                        Err(RuntimeError::ChannelClosed)
                    } else {
                        done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                    }
                } else {
                    Ok(())
                };
                let _ = resp.send(out);
                return true;
            }
        }

        false
    }

    /// Runs one store mutation and hands its journaled op to persistence.
    ///
    /// Queue capacity is reserved first, so a full queue rejects the command
    /// before the store is touched.
    async fn mutate<T>(
        &mut self,
        apply: impl FnOnce(&mut RosterStore) -> Result<(T, StoredOp), StoreError>,
        event: impl FnOnce(&T) -> RosterEvent,
    ) -> Result<T, RuntimeError> {
        let permit = match &self.persist_tx {
            Some(tx) => Some(reserve_persist(tx)?),
            None => None,
        };

        let (out, _) = apply(&mut self.store)?;
        let ops = self.store.drain_pending_ops();

        match permit {
            Some(permit) => {
                let _ = permit.send(PersistMsg::Ops(ops));
            }
            None => {
                let _ = self.events_tx.send(RosterEvent::DurableUpTo {
                    op_seq: self.store.latest_op_seq(),
                });
            }
        }
        let _ = self.events_tx.send(event(&out));

        self.ops_since_snapshot += 1;
        self.maybe_auto_checkpoint().await;
        Ok(out)
    }

    async fn checkpoint(&mut self) -> Result<(), RuntimeError> {
        let Some(tx) = &self.persist_tx else {
            return Ok(());
        };

        let snapshot = self.store.export_snapshot();
        let last_seq = self.store.latest_op_seq();
        let (cp_tx, cp_rx) = oneshot::channel();
        tx.send(PersistMsg::Checkpoint {
            snapshot,
            last_seq,
            compact: self.config.compact_after_snapshot,
            resp: cp_tx,
        })
        .await
        .map_err(|_| RuntimeError::ChannelClosed)?;

        cp_rx.await.map_err(|_| RuntimeError::ChannelClosed)??;
        self.ops_since_snapshot = 0;
        Ok(())
    }

    async fn maybe_auto_checkpoint(&mut self) {
        if self.config.snapshot_every_ops == 0 || self.ops_since_snapshot < self.config.snapshot_every_ops {
            return;
        }
        if let Err(err) = self.checkpoint().await {
            log::warn!("automatic snapshot failed: {err}");
        }
    }
}

fn spawn_persistence_worker(
    sink: Box<dyn OpSink>,
    rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
    backlog: Vec<StoredOp>,
) {
    let worker = PersistWorker {
        sink: Arc::new(Mutex::new(sink)),
        buf: backlog,
        last_durable: 0,
        durable_tx,
        deadline: Instant::now(),
        config,
    };
    tokio::spawn(worker.run(rx));
}

/// Owns the sink and the unflushed tail of the journal.
struct PersistWorker {
    sink: Arc<Mutex<Box<dyn OpSink>>>,
    buf: Vec<StoredOp>,
    last_durable: OpSeq,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    deadline: Instant,
    config: RuntimeConfig,
}

impl PersistWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<PersistMsg>) {
        self.rearm();
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(PersistMsg::Ops(ops)) => self.accept(ops).await,
                    Some(PersistMsg::Flush { resp }) => {
                        let result = self.flush(true).await.map(|_| self.last_durable);
                        let _ = resp.send(result);
                    }
                    Some(PersistMsg::Checkpoint { snapshot, last_seq, compact, resp }) => {
                        let result = self.checkpoint(snapshot, last_seq, compact).await;
                        let _ = resp.send(result);
                    }
                    Some(PersistMsg::Shutdown { resp }) => {
                        let _ = self.flush(true).await;
                        let _ = resp.send(());
                        break;
                    }
                    None => {
                        let _ = self.flush(true).await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(self.deadline), if !self.buf.is_empty() => {
                    let _ = self.flush(false).await;
                }
            }
        }
    }

    async fn accept(&mut self, ops: Vec<StoredOp>) {
        let urgent = self.config.flush_on_check_in && ops.iter().any(|stored| is_urgent(&stored.op));
        self.buf.extend(ops);
        if urgent || self.buf.len() >= self.config.batch_max_ops {
            let _ = self.flush(true).await;
        }
    }

    async fn checkpoint(&mut self, snapshot: StoreSnapshotV1, last_seq: OpSeq, compact: bool) -> Result<(), PersistError> {
        self.flush(true).await?;
        let event_id = snapshot.event.id;
        on_sink(&self.sink, move |sink| {
            sink.write_snapshot(&snapshot, last_seq)?;
            if compact {
                let removed = sink.compact_through(event_id, last_seq)?;
                log::debug!("compacted {removed} ops of event {event_id}");
            }
            Ok(())
        })
        .await
    }

    /// Appends the buffered ops; `sync` also asks the sink to make them durable.
    async fn flush(&mut self, sync: bool) -> Result<(), PersistError> {
        self.rearm();
        if self.buf.is_empty() {
            return if sync { on_sink(&self.sink, |sink| sink.flush()).await } else { Ok(()) };
        }

        let ops = std::mem::take(&mut self.buf);
        let appended = on_sink(&self.sink, move |sink| {
            let seq = sink.append_ops(&ops)?;
            if sync {
                sink.flush()?;
            }
            Ok(seq)
        })
        .await;

        match appended {
            Ok(seq) => {
                self.last_durable = self.last_durable.max(seq);
                let _ = self.durable_tx.send(Ok(self.last_durable));
                Ok(())
            }
            Err(err) => {
                log::error!("journal append failed: {err}");
                let _ = self.durable_tx.send(Err(PersistError::Message(format!("append failed: {err}"))));
                Err(err)
            }
        }
    }

    fn rearm(&mut self) {
        self.deadline = Instant::now() + Duration::from_millis(self.config.batch_max_latency_ms);
    }
}

async fn on_sink<T: Send + 'static>(
    sink: &Arc<Mutex<Box<dyn OpSink>>>,
    work: impl FnOnce(&mut Box<dyn OpSink>) -> Result<T, PersistError> + Send + 'static,
) -> Result<T, PersistError> {
    let sink = Arc::clone(sink);
    tokio::task::spawn_blocking(move || work(&mut sink.blocking_lock()))
        .await
        .map_err(|e| PersistError::Message(format!("join error: {e}")))?
}

/// Ops the desk should not lose to a crash: attendance and the close itself.
fn is_urgent(op: &Op) -> bool {
    matches!(op, Op::CheckIn { .. } | Op::RegisterOnSite { .. } | Op::Close)
}

fn reserve_persist(tx: &mpsc::Sender<PersistMsg>) -> Result<mpsc::OwnedPermit<PersistMsg>, RuntimeError> {
    tx.clone().try_reserve_owned().map_err(|err| match err {
        mpsc::error::TrySendError::Full(_) => {
            log::warn!("persistence queue full; rejecting command");
            RuntimeError::Persist(PersistError::QueueFull)
        }
        mpsc::error::TrySendError::Closed(_) => RuntimeError::ChannelClosed,
    })
}
