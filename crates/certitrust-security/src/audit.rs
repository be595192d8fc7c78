// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only, hash-chained log of issuance and verification
// events.
//
// Each entry stores the hash of its predecessor, and its own hash is
//
//   entry_hash = SHA-256(prev_entry_hash || serialized_fields)
//
// where `prev_entry_hash` of the first entry is 32 zero bytes and the fields
// are length-prefixed (u32 big-endian) in the order: sequence, event_type,
// document_id, detail, timestamp. Recomputing from genesis must reproduce
// every stored hash.
//
// SQLite schema:
//   audit_chain(
//     sequence        INTEGER PRIMARY KEY,   -- 0-based, gap-free
//     event_type      TEXT    NOT NULL,      -- "issued", "verified", ...
//     document_id     TEXT    NOT NULL,      -- "" when unknown
//     detail          TEXT    NOT NULL,
//     timestamp       TEXT    NOT NULL,      -- RFC 3339, microseconds, Z
//     prev_entry_hash TEXT    NOT NULL,      -- hex
//     entry_hash      TEXT    NOT NULL       -- hex
//   )

use std::path::Path;
use std::sync::Mutex;

use certitrust_core::error::{CertiTrustError, Result};
use certitrust_core::types::{AuditEvent, AuditEventKind};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tracing::{debug, info, instrument, warn};

/// Predecessor hash of the first entry in every chain.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

// ---------------------------------------------------------------------------
// Local error helpers
// ---------------------------------------------------------------------------

/// Convert a `rusqlite::Error` into a `CertiTrustError::Database`.
fn db_err(e: rusqlite::Error) -> CertiTrustError {
    CertiTrustError::Database(e.to_string())
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A single committed link of the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub event_type: AuditEventKind,
    pub document_id: String,
    pub detail: String,
    pub timestamp: String,
    pub prev_entry_hash: String,
    pub entry_hash: String,
}

impl AuditEntry {
    /// Length-prefixed encoding of every field covered by `entry_hash`.
    pub fn serialized_fields(&self) -> Vec<u8> {
        let sequence = self.sequence.to_string();
        let fields: [&[u8]; 5] = [
            sequence.as_bytes(),
            self.event_type.as_str().as_bytes(),
            self.document_id.as_bytes(),
            self.detail.as_bytes(),
            self.timestamp.as_bytes(),
        ];
        let mut out = Vec::with_capacity(fields.iter().map(|f| f.len() + 4).sum());
        for field in fields {
            out.extend_from_slice(&(field.len() as u32).to_be_bytes());
            out.extend_from_slice(field);
        }
        out
    }

    /// Hash this entry would have if chained after `prev`.
    pub fn compute_hash(&self, prev: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(prev);
        hasher.update(self.serialized_fields());
        hasher.finalize().into()
    }
}

/// Where the next entry attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTail {
    /// Hash of the last committed entry, or [`GENESIS_HASH`] for an empty chain.
    pub prev_hash: [u8; 32],
    /// Sequence number the next entry must carry.
    pub offset: u64,
}

impl ChainTail {
    pub fn genesis() -> Self {
        Self {
            prev_hash: GENESIS_HASH,
            offset: 0,
        }
    }

    fn after(entry: &AuditEntry) -> Result<Self> {
        Ok(Self {
            prev_hash: decode_hash(&entry.entry_hash)?,
            offset: entry.sequence + 1,
        })
    }
}

/// Append-only storage for audit entries.
///
/// `append` must refuse an entry whose sequence or `prev_entry_hash` does not
/// match the current tail, so a stale read can never fork the chain.
pub trait AuditSink: Send {
    fn read_tail(&self) -> Result<ChainTail>;

    /// Commit `entry` and return its offset.
    fn append(&mut self, entry: &AuditEntry) -> Result<u64>;

    /// Every entry in sequence order.
    fn entries(&self) -> Result<Vec<AuditEntry>>;
}

fn decode_hash(hex_str: &str) -> Result<[u8; 32]> {
    hex::decode(hex_str)
        .ok()
        .and_then(|v| <[u8; 32]>::try_from(v).ok())
        .ok_or_else(|| CertiTrustError::AuditWriteFailed(format!("stored hash {hex_str:?} is not 32-byte hex")))
}

fn check_attaches(tail: &ChainTail, entry: &AuditEntry) -> Result<()> {
    if entry.sequence != tail.offset || entry.prev_entry_hash != hex::encode(tail.prev_hash) {
        return Err(CertiTrustError::AuditWriteFailed(format!(
            "chain tail moved: entry {} does not attach at offset {}",
            entry.sequence, tail.offset
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

/// Volatile sink, for tests and for running without a database.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Vec<AuditEntry>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn read_tail(&self) -> Result<ChainTail> {
        match self.entries.last() {
            Some(last) => ChainTail::after(last),
            None => Ok(ChainTail::genesis()),
        }
    }

    fn append(&mut self, entry: &AuditEntry) -> Result<u64> {
        check_attaches(&self.read_tail()?, entry)?;
        self.entries.push(entry.clone());
        Ok(entry.sequence)
    }

    fn entries(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.entries.clone())
    }
}

// ---------------------------------------------------------------------------
// SQLite sink
// ---------------------------------------------------------------------------

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS audit_chain (
    sequence        INTEGER PRIMARY KEY,
    event_type      TEXT    NOT NULL,
    document_id     TEXT    NOT NULL,
    detail          TEXT    NOT NULL,
    timestamp       TEXT    NOT NULL,
    prev_entry_hash TEXT    NOT NULL,
    entry_hash      TEXT    NOT NULL
);";

const SELECT_COLUMNS: &str =
    "SELECT sequence, event_type, document_id, detail, timestamp, prev_entry_hash, entry_hash
     FROM audit_chain";

/// Audit sink backed by a SQLite database.
///
/// The tail check and the insert share one immediate transaction, so even a
/// second process writing the same file cannot interleave between them.
pub struct SqliteAuditSink {
    conn: Connection,
}

impl SqliteAuditSink {
    /// Open (or create) the audit database at `path`, with WAL enabled.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("audit chain opened");
        Ok(Self { conn })
    }

    /// Open an in-memory audit database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory audit chain opened");
        Ok(Self { conn })
    }

    /// All entries for one document, oldest first.
    pub fn entries_for_document(&self, document_id: &str) -> Result<Vec<AuditEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE document_id = ?1 ORDER BY sequence ASC");
        self.query(&sql, params![document_id])
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY sequence DESC LIMIT ?1");
        self.query(&sql, params![limit])
    }

    /// Total number of entries.
    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM audit_chain", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let rows = stmt.query_map(args, row_to_raw).map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(raw_to_entry(row.map_err(db_err)?)?);
        }
        Ok(entries)
    }
}

type RawRow = (i64, String, String, String, String, String, String);

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn raw_to_entry(raw: RawRow) -> Result<AuditEntry> {
    let (sequence, event_type, document_id, detail, timestamp, prev_entry_hash, entry_hash) = raw;
    let event_type = AuditEventKind::parse(&event_type).ok_or_else(|| {
        CertiTrustError::Database(format!("unknown audit event type {event_type:?}"))
    })?;
    Ok(AuditEntry {
        sequence: sequence as u64,
        event_type,
        document_id,
        detail,
        timestamp,
        prev_entry_hash,
        entry_hash,
    })
}

impl AuditSink for SqliteAuditSink {
    fn read_tail(&self) -> Result<ChainTail> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY sequence DESC LIMIT 1");
        let last = self
            .conn
            .query_row(&sql, [], row_to_raw)
            .optional()
            .map_err(db_err)?;
        match last {
            Some(raw) => ChainTail::after(&raw_to_entry(raw)?),
            None => Ok(ChainTail::genesis()),
        }
    }

    fn append(&mut self, entry: &AuditEntry) -> Result<u64> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let sql = format!("{SELECT_COLUMNS} ORDER BY sequence DESC LIMIT 1");
        let last = tx.query_row(&sql, [], row_to_raw).optional().map_err(db_err)?;
        let tail = match last {
            Some(raw) => ChainTail::after(&raw_to_entry(raw)?)?,
            None => ChainTail::genesis(),
        };
        check_attaches(&tail, entry)?;

        tx.execute(
            "INSERT INTO audit_chain
                 (sequence, event_type, document_id, detail, timestamp, prev_entry_hash, entry_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.sequence as i64,
                entry.event_type.as_str(),
                entry.document_id,
                entry.detail,
                entry.timestamp,
                entry.prev_entry_hash,
                entry.entry_hash,
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        Ok(entry.sequence)
    }

    fn entries(&self) -> Result<Vec<AuditEntry>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY sequence ASC");
        self.query(&sql, [])
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Builds chained entries and appends them to a sink.
///
/// The mutex spans the whole read-tail, hash, append cycle, so concurrent
/// callers are linearized into one definitive order.
pub struct AuditRecorder {
    sink: Mutex<Box<dyn AuditSink>>,
}

impl AuditRecorder {
    pub fn new(sink: impl AuditSink + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Recorder over a fresh [`MemoryAuditSink`].
    pub fn in_memory() -> Self {
        Self::new(MemoryAuditSink::new())
    }

    /// Chain `event` onto the log and return the committed entry.
    ///
    /// Every failure surfaces as `AuditWriteFailed`.
    #[instrument(skip_all, fields(event_type = event.kind.as_str()))]
    pub fn record(&self, event: &AuditEvent) -> Result<AuditEntry> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| CertiTrustError::AuditWriteFailed("audit lock poisoned".into()))?;

        let tail = sink.read_tail().map_err(into_write_failed)?;

        let mut entry = AuditEntry {
            sequence: tail.offset,
            event_type: event.kind,
            document_id: event
                .document_id
                .as_ref()
                .map(|id| id.as_str().to_owned())
                .unwrap_or_default(),
            detail: event.detail.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            prev_entry_hash: hex::encode(tail.prev_hash),
            entry_hash: String::new(),
        };
        entry.entry_hash = hex::encode(entry.compute_hash(&tail.prev_hash));

        sink.append(&entry).map_err(into_write_failed)?;

        info!(
            sequence = entry.sequence,
            document_id = %entry.document_id,
            detail = %entry.detail,
            "audit entry recorded"
        );
        Ok(entry)
    }

    /// Snapshot of the whole chain.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let sink = self
            .sink
            .lock()
            .map_err(|_| CertiTrustError::AuditWriteFailed("audit lock poisoned".into()))?;
        sink.entries()
    }

    /// Recompute the stored chain from genesis.
    pub fn verify(&self) -> Result<ChainReport> {
        Ok(verify_chain(&self.entries()?))
    }
}

fn into_write_failed(e: CertiTrustError) -> CertiTrustError {
    match e {
        CertiTrustError::AuditWriteFailed(_) => e,
        other => CertiTrustError::AuditWriteFailed(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Chain verification
// ---------------------------------------------------------------------------

/// Result of recomputing a chain from genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub total_entries: usize,
    /// Sequence numbers whose stored link or hash disagrees with the
    /// recomputation.
    pub broken: Vec<u64>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.broken.is_empty()
    }
}

/// Walk `entries` (in sequence order) recomputing every hash from genesis.
///
/// The walk carries the *recomputed* hash forward, so tampering with one
/// entry's fields also breaks every entry after it.
pub fn verify_chain(entries: &[AuditEntry]) -> ChainReport {
    let mut running = GENESIS_HASH;
    let mut broken = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let expected = entry.compute_hash(&running);
        let linked = entry.prev_entry_hash == hex::encode(running);
        let hashed = entry.entry_hash == hex::encode(expected);
        if entry.sequence != index as u64 || !linked || !hashed {
            warn!(sequence = entry.sequence, linked, hashed, "audit chain link broken");
            broken.push(entry.sequence);
        }
        running = expected;
    }

    ChainReport {
        total_entries: entries.len(),
        broken,
    }
}
