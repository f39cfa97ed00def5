//! SQLite-backed append-only op journal sink.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::EventCatalog,
    core::store::{RosterStore, StoreSnapshotV1},
    op::{OP_FORMAT_VERSION, StoredOp, StoredOpEnvelope},
    types::{EventId, OpSeq},
};

use super::{OpSink, PersistError, PersistResult};

const SNAPSHOT_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u16,
    snapshot: StoreSnapshotV1,
}

/// SQLite implementation of [`crate::persist::OpSink`].
///
/// Every event keeps its own journal, keyed by `(event_id, seq)`.
pub struct SqliteOpSink {
    conn: Connection,
}

impl SqliteOpSink {
    /// Opens or creates a SQLite-backed sink at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite sink.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Ids of every event with a journal or a snapshot, ascending.
    pub fn event_ids(&self) -> PersistResult<Vec<EventId>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id FROM ops UNION SELECT event_id FROM snapshots ORDER BY event_id ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row? as EventId);
        }
        Ok(out)
    }

    /// Loads one event from its latest snapshot plus tail ops.
    pub fn load_store(&self, event_id: EventId) -> PersistResult<RosterStore> {
        if let Some(snapshot) = self.load_latest_snapshot(event_id)? {
            let mut store = RosterStore::from_snapshot(snapshot)?;
            let start_seq = store.latest_op_seq();
            for op in self.load_ops_after(event_id, start_seq)? {
                store.apply_replayed_op(op)?;
            }
            return Ok(store);
        }

        let ops = self.load_ops_after(event_id, 0)?;
        if ops.is_empty() {
            return Err(PersistError::UnknownEvent(event_id));
        }
        Ok(RosterStore::replay(ops)?)
    }

    /// Loads every stored event.
    pub fn load_catalog(&self) -> PersistResult<EventCatalog> {
        let mut stores = Vec::new();
        for id in self.event_ids()? {
            stores.push(self.load_store(id)?);
        }
        log::debug!("loaded {} events from sqlite", stores.len());
        Ok(EventCatalog::from_stores(stores))
    }

    fn load_ops_after(&self, event_id: EventId, seq: OpSeq) -> PersistResult<Vec<StoredOp>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, ts_ms, payload FROM ops WHERE event_id = ?1 AND seq > ?2 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![event_id as i64, seq as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, Vec<u8>>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(seq, ts_ms, payload)| {
                let mut stored = decode_op(&payload)?;
                stored.seq = seq as OpSeq;
                stored.ts_ms = ts_ms as u64;
                Ok(stored)
            })
            .collect()
    }

    /// Writes a snapshot covering `last_seq` of the snapshot's event.
    pub fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, last_seq: OpSeq) -> PersistResult<()> {
        let env = SnapshotEnvelope {
            format_version: SNAPSHOT_FORMAT_VERSION,
            snapshot: snapshot.clone(),
        };
        let payload = serde_json::to_vec(&env)?;
        self.conn.execute(
            "INSERT INTO snapshots(event_id, last_seq, ts_ms, payload) VALUES (?1, ?2, ?3, ?4)",
            params![snapshot.event.id as i64, last_seq as i64, now_ms() as i64, payload],
        )?;
        Ok(())
    }

    /// Deletes one event's ops up to and including `seq`.
    pub fn compact_through(&mut self, event_id: EventId, seq: OpSeq) -> PersistResult<usize> {
        let count = self.conn.execute(
            "DELETE FROM ops WHERE event_id = ?1 AND seq <= ?2",
            params![event_id as i64, seq as i64],
        )?;
        Ok(count)
    }

    /// Returns the latest sequence persisted for `event_id`.
    pub fn latest_seq(&self, event_id: EventId) -> PersistResult<OpSeq> {
        let seq: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(seq) FROM ops WHERE event_id = ?1",
                params![event_id as i64],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(seq.unwrap_or(0) as OpSeq)
    }

    fn load_latest_snapshot(&self, event_id: EventId) -> PersistResult<Option<StoreSnapshotV1>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots WHERE event_id = ?1 ORDER BY id DESC LIMIT 1",
                params![event_id as i64],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let env: SnapshotEnvelope = serde_json::from_slice(&payload)?;
        if env.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistError::Message(format!(
                "snapshot format version {} is not supported",
                env.format_version
            )));
        }
        Ok(Some(env.snapshot))
    }
}

impl OpSink for SqliteOpSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let Some(last) = ops.last() else {
            return Ok(0);
        };

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ops(event_id, seq, ts_ms, kind, visitor_id, payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for stored in ops {
                let payload = serde_json::to_vec(&StoredOpEnvelope::new(stored.clone()))?;
                stmt.execute(params![
                    stored.event_id as i64,
                    stored.seq as i64,
                    stored.ts_ms as i64,
                    stored.op.kind(),
                    stored.op.visitor_id().map(|v| v as i64),
                    payload,
                ])?;
            }
        }
        tx.commit()?;

        log::debug!("appended {} ops through #{}", ops.len(), last.seq);
        Ok(last.seq)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, last_seq: OpSeq) -> PersistResult<()> {
        SqliteOpSink::write_snapshot(self, snapshot, last_seq)
    }

    fn compact_through(&mut self, event_id: EventId, seq: OpSeq) -> PersistResult<usize> {
        SqliteOpSink::compact_through(self, event_id, seq)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn decode_op(payload: &[u8]) -> PersistResult<StoredOp> {
    let envelope: StoredOpEnvelope = serde_json::from_slice(payload)?;
    if envelope.format_version != OP_FORMAT_VERSION {
        return Err(PersistError::Message(format!(
            "op format version {} is not supported",
            envelope.format_version
        )));
    }
    Ok(envelope.stored)
}
