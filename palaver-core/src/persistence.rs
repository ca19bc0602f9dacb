//! SQLite persistence for quests, NPC memory, village assignments and names.
//!
//! One database per world. Payloads that have internal structure are stored
//! as JSON inside a BLOB column so the schema survives changes to the
//! payload types:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS quest_ledger (
//!     player_id  TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! -- npc_memory has the same shape, keyed by npc_id
//! CREATE TABLE IF NOT EXISTS village_assignment (
//!     npc_id      TEXT PRIMARY KEY,
//!     village_id  TEXT NOT NULL,
//!     name        TEXT NOT NULL,
//!     quest_giver INTEGER NOT NULL
//! );
//! CREATE TABLE IF NOT EXISTS npc_names (
//!     npc_id    TEXT PRIMARY KEY,
//!     base_name TEXT NOT NULL
//! );
//! ```
//!
//! Rows that fail to decode are skipped with a warning; a bad row never
//! prevents the rest of the world from loading.
//!
//! Writes from the authoritative thread go through [`PersistenceWriter`],
//! which owns the connection on its own thread and applies operations in
//! the order they were submitted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Instant;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PersistenceConfig;
use crate::error::{PalaverError, Result};
use crate::history::ConversationHistory;
use crate::quest::{LedgerSink, Quest};
use crate::types::{EntityId, VillageId};
use crate::village::VillageAssignment;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS quest_ledger (
        player_id  TEXT PRIMARY KEY,
        data       BLOB NOT NULL,
        updated_at TEXT NOT NULL,
        checksum   TEXT
    );
    CREATE TABLE IF NOT EXISTS npc_memory (
        npc_id     TEXT PRIMARY KEY,
        data       BLOB NOT NULL,
        updated_at TEXT NOT NULL,
        checksum   TEXT
    );
    CREATE TABLE IF NOT EXISTS village_assignment (
        npc_id      TEXT PRIMARY KEY,
        village_id  TEXT NOT NULL,
        name        TEXT NOT NULL,
        quest_giver INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS npc_names (
        npc_id    TEXT PRIMARY KEY,
        base_name TEXT NOT NULL
    );";

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// CRC-32 (ISO 3309 / ITU-T V.42).
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Handle to an open world database.
pub struct Store {
    conn: Connection,
    checksum_enabled: bool,
    db_path: PathBuf,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("db_path", &self.db_path)
            .field("checksum_enabled", &self.checksum_enabled)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database at `path`, creating the schema.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), wal = config.wal_mode, "Palaver store opened");

        Ok(Self {
            conn,
            checksum_enabled: config.checksum_enabled,
            db_path,
        })
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            checksum_enabled: config.checksum_enabled,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path of the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ------------------------------------------------------------------
    // JSON blob tables
    // ------------------------------------------------------------------

    fn put_blob<T: serde::Serialize + ?Sized>(
        &self,
        table: &str,
        key_column: &str,
        id: EntityId,
        value: &T,
    ) -> Result<()> {
        let json =
            serde_json::to_vec(value).map_err(|e| PalaverError::Serialization(e.to_string()))?;
        let checksum = self.checksum_enabled.then(|| crc32_hex(&json));
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            &format!(
                "INSERT INTO {table} ({key_column}, data, updated_at, checksum)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT({key_column}) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at,
                    checksum = excluded.checksum"
            ),
            params![id.to_string(), json, now, checksum],
        )?;
        Ok(())
    }

    fn delete_row(&self, table: &str, key_column: &str, id: EntityId) -> Result<()> {
        self.conn.execute(
            &format!("DELETE FROM {table} WHERE {key_column} = ?1"),
            params![id.to_string()],
        )?;
        Ok(())
    }

    /// Decode a blob row, verifying its checksum. `None` means the row is
    /// unusable and should be treated as empty.
    fn decode_blob<T: serde::de::DeserializeOwned>(
        &self,
        id: &str,
        data: &[u8],
        stored_checksum: Option<&str>,
    ) -> Option<T> {
        if self.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(data);
                if expected != actual {
                    warn!(id, expected, actual = %actual, "Checksum mismatch, possible save corruption");
                }
            }
        }
        match serde_json::from_slice(data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(id, error = %e, "Malformed row, treating as empty");
                None
            }
        }
    }

    fn all_blobs<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        key_column: &str,
    ) -> Result<HashMap<EntityId, T>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {key_column}, data, checksum FROM {table}"))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut out = HashMap::new();
        for row in rows {
            let (id, data, checksum) = row?;
            let Some(entity) = EntityId::parse(&id) else {
                warn!(id = %id, table, "Skipping row with invalid UUID");
                continue;
            };
            if let Some(value) = self.decode_blob(&id, &data, checksum.as_deref()) {
                out.insert(entity, value);
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Quest ledger
    // ------------------------------------------------------------------

    /// Replace `player`'s quest list. An empty list removes the row.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError`] on encoding or SQLite failures.
    pub fn save_quests(&self, player: EntityId, quests: &[Quest]) -> Result<()> {
        if quests.is_empty() {
            return self.delete_row("quest_ledger", "player_id", player);
        }
        self.put_blob("quest_ledger", "player_id", player, quests)?;
        debug!(player = %player, quests = quests.len(), "Saved quest ledger");
        Ok(())
    }

    /// Load every player's quests.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn load_quest_ledger(&self) -> Result<HashMap<EntityId, Vec<Quest>>> {
        self.all_blobs("quest_ledger", "player_id")
    }

    // ------------------------------------------------------------------
    // NPC memory
    // ------------------------------------------------------------------

    /// Store an NPC's history as marked lines.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError`] on encoding or SQLite failures.
    pub fn save_history(&self, npc: EntityId, lines: &[String]) -> Result<()> {
        self.put_blob("npc_memory", "npc_id", npc, lines)
    }

    /// Load an NPC's history, keeping the newest `cap` entries. Missing or
    /// malformed rows yield an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn load_history(&self, npc: EntityId, cap: usize) -> Result<ConversationHistory> {
        let id = npc.to_string();
        let row: Option<(Vec<u8>, Option<String>)> = self
            .conn
            .prepare_cached("SELECT data, checksum FROM npc_memory WHERE npc_id = ?1")?
            .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let lines: Vec<String> = row
            .and_then(|(data, checksum)| self.decode_blob(&id, &data, checksum.as_deref()))
            .unwrap_or_default();
        Ok(ConversationHistory::from_marked_lines(lines, cap))
    }

    /// Load every NPC's history, each capped to `cap`.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn load_histories(&self, cap: usize) -> Result<HashMap<EntityId, ConversationHistory>> {
        let raw: HashMap<EntityId, Vec<String>> = self.all_blobs("npc_memory", "npc_id")?;
        Ok(raw
            .into_iter()
            .map(|(npc, lines)| (npc, ConversationHistory::from_marked_lines(lines, cap)))
            .collect())
    }

    // ------------------------------------------------------------------
    // Villages and names
    // ------------------------------------------------------------------

    /// Upsert an NPC's village assignment.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn save_village(&self, npc: EntityId, assignment: &VillageAssignment) -> Result<()> {
        self.conn.execute(
            "INSERT INTO village_assignment (npc_id, village_id, name, quest_giver)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(npc_id) DO UPDATE SET
                village_id = excluded.village_id,
                name = excluded.name,
                quest_giver = excluded.quest_giver",
            params![
                npc.to_string(),
                assignment.village_id.to_string(),
                assignment.name,
                assignment.quest_giver
            ],
        )?;
        Ok(())
    }

    /// Load every village assignment.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn load_villages(&self) -> Result<HashMap<EntityId, VillageAssignment>> {
        let mut stmt = self
            .conn
            .prepare("SELECT npc_id, village_id, name, quest_giver FROM village_assignment")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut out = HashMap::new();
        for row in rows {
            let (npc, village, name, quest_giver) = row?;
            match (EntityId::parse(&npc), Uuid::parse_str(&village)) {
                (Some(npc), Ok(village)) => {
                    out.insert(
                        npc,
                        VillageAssignment {
                            village_id: VillageId(village),
                            name,
                            quest_giver,
                        },
                    );
                }
                _ => warn!(npc = %npc, village = %village, "Skipping malformed village row"),
            }
        }
        Ok(out)
    }

    /// Persist an NPC's base name.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn save_base_name(&self, npc: EntityId, base_name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO npc_names (npc_id, base_name) VALUES (?1, ?2)
             ON CONFLICT(npc_id) DO UPDATE SET base_name = excluded.base_name",
            params![npc.to_string(), base_name],
        )?;
        Ok(())
    }

    /// Load every persisted base name.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] on SQLite failures.
    pub fn load_base_names(&self) -> Result<HashMap<EntityId, String>> {
        let mut stmt = self.conn.prepare("SELECT npc_id, base_name FROM npc_names")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (npc, name) = row?;
            if let Some(npc) = EntityId::parse(&npc) {
                out.insert(npc, name);
            } else {
                warn!(npc = %npc, "Skipping name row with invalid UUID");
            }
        }
        Ok(out)
    }

    /// Run `PRAGMA integrity_check`.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    fn apply(&self, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::Quests { player, quests } => self.save_quests(player, &quests),
            WriteOp::History { npc, lines } => self.save_history(npc, &lines),
            WriteOp::Village { npc, assignment } => self.save_village(npc, &assignment),
            WriteOp::BaseName { npc, name } => self.save_base_name(npc, &name),
            WriteOp::Flush(_) | WriteOp::Shutdown => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Background writer
// ---------------------------------------------------------------------------

/// A single write submitted to the background writer.
#[derive(Debug)]
pub enum WriteOp {
    /// Replace a player's quest list.
    Quests {
        /// Owner.
        player: EntityId,
        /// Complete list.
        quests: Vec<Quest>,
    },
    /// Replace an NPC's history.
    History {
        /// The NPC.
        npc: EntityId,
        /// Marked lines, oldest first.
        lines: Vec<String>,
    },
    /// Upsert a village assignment.
    Village {
        /// The NPC.
        npc: EntityId,
        /// Its assignment.
        assignment: VillageAssignment,
    },
    /// Persist a base name.
    BaseName {
        /// The NPC.
        npc: EntityId,
        /// Base name.
        name: String,
    },
    /// Acknowledge once every earlier op has been applied.
    Flush(oneshot::Sender<()>),
    /// Stop the writer thread.
    Shutdown,
}

/// Cloneable submission side of the writer. Never blocks.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriterHandle {
    /// Submit an operation. Failures after shutdown are logged and dropped.
    pub fn submit(&self, op: WriteOp) {
        if self.tx.send(op).is_err() {
            warn!("Persistence writer closed, dropping write");
        }
    }

    /// Persist a player's quest list.
    pub fn save_quests(&self, player: EntityId, quests: Vec<Quest>) {
        self.submit(WriteOp::Quests { player, quests });
    }

    /// Persist an NPC's history.
    pub fn save_history(&self, npc: EntityId, history: &ConversationHistory) {
        self.submit(WriteOp::History {
            npc,
            lines: history.to_marked_lines(),
        });
    }

    /// Persist a village assignment.
    pub fn save_village(&self, npc: EntityId, assignment: VillageAssignment) {
        self.submit(WriteOp::Village { npc, assignment });
    }

    /// Persist a base name.
    pub fn save_base_name(&self, npc: EntityId, name: String) {
        self.submit(WriteOp::BaseName { npc, name });
    }

    /// Block until every previously submitted write has been applied.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::WriterClosed`] if the writer has stopped.
    pub fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(WriteOp::Flush(ack))
            .map_err(|_| PalaverError::WriterClosed)?;
        done.blocking_recv().map_err(|_| PalaverError::WriterClosed)
    }
}

impl LedgerSink for WriterHandle {
    fn persist(&self, player: EntityId, quests: Vec<Quest>) {
        self.save_quests(player, quests);
    }
}

/// Owns the [`Store`] on a dedicated thread and applies writes in order.
#[derive(Debug)]
pub struct PersistenceWriter {
    handle: WriterHandle,
    thread: Option<JoinHandle<()>>,
}

impl PersistenceWriter {
    /// Move `store` onto a new writer thread.
    ///
    /// # Errors
    ///
    /// Returns [`PalaverError::Io`] if the thread cannot be spawned.
    pub fn spawn(store: Store) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        let thread = std::thread::Builder::new()
            .name("palaver-persistence".to_string())
            .spawn(move || {
                while let Some(op) = rx.blocking_recv() {
                    let start = Instant::now();
                    match op {
                        WriteOp::Shutdown => break,
                        WriteOp::Flush(ack) => {
                            let _ = ack.send(());
                        }
                        op => {
                            if let Err(e) = store.apply(op) {
                                error!(error = %e, "Persistence write failed");
                            } else {
                                debug!(elapsed_us = start.elapsed().as_micros(), "Write applied");
                            }
                        }
                    }
                }
                info!(path = %store.db_path().display(), "Persistence writer stopped");
            })?;

        Ok(Self {
            handle: WriterHandle { tx },
            thread: Some(thread),
        })
    }

    /// A submission handle for this writer.
    #[must_use]
    pub fn handle(&self) -> WriterHandle {
        self.handle.clone()
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        self.handle.submit(WriteOp::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Persistence writer thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
