//! SQLite-based content sink
//!
//! Every accepted entity becomes one row in `entity_records`, error records
//! included. Content itself is not stored; its length and SHA-256 digest are.

use crate::output::traits::{ContentSink, SinkError, SinkResult};
use crate::source::ContentStream;
use crate::state::{DataEntity, ModificationState};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entity_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL,
    source_id TEXT NOT NULL,
    parent_id TEXT,
    depth INTEGER NOT NULL,
    kind TEXT NOT NULL,
    state TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    attributes TEXT NOT NULL,
    content_length INTEGER,
    content_sha256 TEXT,
    error_message TEXT,
    error_stacktrace TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entity_records_run ON entity_records(run_id);
CREATE INDEX IF NOT EXISTS idx_entity_records_state ON entity_records(state);
CREATE INDEX IF NOT EXISTS idx_entity_records_source ON entity_records(source_id);
";

/// Sink writing entity rows to a SQLite database
pub struct SqliteSink {
    conn: Mutex<Connection>,
    run_id: i64,
}

impl SqliteSink {
    /// Opens or creates the output database; rows are stamped with `run_id`
    pub fn open(path: &Path, run_id: i64) -> SinkResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        Self::from_connection(conn, run_id)
    }

    pub fn open_in_memory(run_id: i64) -> SinkResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, run_id)
    }

    fn from_connection(conn: Connection, run_id: i64) -> SinkResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SinkError::Storage(format!("Failed to lock output database: {}", e)))
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Counts rows, optionally restricted to one run
    pub fn count_records(&self, run_id: Option<i64>) -> SinkResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entity_records WHERE (?1 IS NULL OR run_id = ?1)",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn count_by_state(&self, run_id: Option<i64>) -> SinkResult<HashMap<ModificationState, u64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT state, COUNT(*) FROM entity_records
             WHERE (?1 IS NULL OR run_id = ?1) GROUP BY state",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (state, count) = row?;
            match ModificationState::from_db_string(&state) {
                Some(state) => {
                    counts.insert(state, count as u64);
                }
                None => tracing::warn!("Unknown state '{}' in entity_records", state),
            }
        }
        Ok(counts)
    }

    pub fn count_by_kind(&self, run_id: Option<i64>) -> SinkResult<HashMap<String, u64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*) FROM entity_records
             WHERE (?1 IS NULL OR run_id = ?1) GROUP BY kind",
        )?;
        let counts = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    /// Total content bytes and deepest depth among materialized rows
    pub fn content_totals(&self, run_id: Option<i64>) -> SinkResult<(u64, u32)> {
        let conn = self.lock()?;
        let (bytes, depth): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(content_length), 0), COALESCE(MAX(depth), 0)
             FROM entity_records WHERE (?1 IS NULL OR run_id = ?1)",
            params![run_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((bytes as u64, depth as u32))
    }

    /// Source ids and messages of error rows, oldest first
    pub fn error_messages(&self, run_id: Option<i64>, limit: usize) -> SinkResult<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, COALESCE(error_message, '') FROM entity_records
             WHERE state = ?1 AND (?2 IS NULL OR run_id = ?2)
             ORDER BY id LIMIT ?3",
        )?;
        let errors = stmt
            .query_map(
                params![ModificationState::Error.to_db_string(), run_id, limit as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(errors)
    }

    /// The most recent run id present in the table
    pub fn latest_run(&self) -> SinkResult<Option<i64>> {
        let conn = self.lock()?;
        let run: Option<i64> =
            conn.query_row("SELECT MAX(run_id) FROM entity_records", [], |row| row.get(0))?;
        Ok(run)
    }
}

#[async_trait]
impl ContentSink for SqliteSink {
    async fn accept(&self, entity: DataEntity, content: Option<ContentStream>) -> SinkResult<()> {
        let digest = match content {
            Some(mut stream) => {
                let bytes = stream.read_to_end().await?;
                Some((bytes.len() as i64, hex::encode(Sha256::digest(&bytes))))
            }
            None => None,
        };
        let (length, sha) = match digest {
            Some((length, sha)) => (Some(length), Some(sha)),
            None => (None, None),
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO entity_records (
                run_id, source_id, parent_id, depth, kind, state, fingerprint,
                attributes, content_length, content_sha256, error_message,
                error_stacktrace, recorded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                self.run_id,
                entity.source_id,
                entity.parent_id,
                entity.depth,
                entity.kind.as_str(),
                entity.modification_state.to_db_string(),
                entity.content_fingerprint,
                entity.attributes.to_lines(),
                length,
                sha,
                entity.error_message,
                entity.error_stacktrace,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn finish(&self) -> SinkResult<()> {
        let conn = self.lock()?;
        // Fold the WAL back so the file is complete on its own.
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}
