//! SQLite change tracker
//!
//! This module provides a SQLite-backed implementation of the
//! ChangeTracker trait, persisting fingerprints across crawl runs.

use crate::state::ModificationState;
use crate::tracker::schema::initialize_schema;
use crate::tracker::traits::{classify_against, ChangeTracker, TrackerError, TrackerResult};
use crate::tracker::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// SQLite change-tracking backend
pub struct SqliteChangeTracker {
    conn: Mutex<Connection>,
    /// Run stamped on every recorded entity; 0 outside of a run
    current_run: AtomicI64,
}

impl SqliteChangeTracker {
    /// Opens or creates the tracker database at `path`
    pub fn open(path: &Path) -> TrackerResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory tracker
    pub fn open_in_memory() -> TrackerResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            current_run: AtomicI64::new(0),
        }
    }

    fn lock(&self) -> TrackerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TrackerError::Unavailable(format!("Failed to lock tracker: {}", e)))
    }

    // ===== Run Management =====

    /// Creates a new run; subsequent records are stamped with it
    pub fn start_run(&self, config_hash: &str) -> TrackerResult<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        let run_id = conn.last_insert_rowid();
        self.current_run.store(run_id, Ordering::SeqCst);
        Ok(run_id)
    }

    /// Marks a run as finished with the given status
    pub fn complete_run(&self, run_id: i64, status: RunStatus) -> TrackerResult<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(TrackerError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> TrackerResult<Option<RunRecord>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or(RunStatus::Running),
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    // ===== Entity Bookkeeping =====

    /// Lists tracked entities that were not seen during `run_id`
    ///
    /// After a completed run these are the deletion candidates.
    pub fn unseen_since(&self, run_id: i64) -> TrackerResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT entity_key FROM tracked_entities WHERE last_seen_run < ?1 ORDER BY entity_key",
        )?;
        let keys = stmt
            .query_map(params![run_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Gets the total number of tracked entities
    pub fn count_entities(&self) -> TrackerResult<u64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM tracked_entities", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Forgets every fingerprint so the next crawl treats everything as new
    pub fn clear(&self) -> TrackerResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM tracked_entities", [])?;
        Ok(())
    }
}

impl ChangeTracker for SqliteChangeTracker {
    fn classify(&self, id: &str, fingerprint: &str) -> TrackerResult<ModificationState> {
        let conn = self.lock()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT fingerprint FROM tracked_entities WHERE entity_key = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(classify_against(stored.as_deref(), fingerprint))
    }

    fn record(&self, id: &str, fingerprint: &str) -> TrackerResult<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO tracked_entities (entity_key, fingerprint, first_seen_at, last_seen_at, last_seen_run)
             VALUES (?1, ?2, ?3, ?3, ?4)
             ON CONFLICT(entity_key) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                last_seen_at = excluded.last_seen_at,
                last_seen_run = excluded.last_seen_run",
            params![id, fingerprint, now, self.current_run.load(Ordering::SeqCst)],
        )?;
        Ok(())
    }
}
