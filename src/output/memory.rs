//! In-memory content sink
//!
//! Collects every accepted entity and its content bytes. Used by dry runs and
//! as the test double throughout the crate.

use crate::output::traits::{ContentSink, SinkError, SinkResult};
use crate::source::ContentStream;
use crate::state::{DataEntity, ModificationState};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One accepted entity
#[derive(Debug, Clone)]
pub struct SinkRecord {
    pub entity: DataEntity,
    /// Fully read content; None for containers and error records
    pub content: Option<Vec<u8>>,
}

/// Sink that keeps everything it receives
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
    finished: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, Vec<SinkRecord>>> {
        self.records
            .lock()
            .map_err(|e| SinkError::Storage(format!("Failed to lock memory sink: {}", e)))
    }

    /// Snapshot of the records accepted so far, in arrival order
    pub fn records(&self) -> Vec<SinkRecord> {
        self.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Entities delivered as error records
    pub fn error_records(&self) -> Vec<DataEntity> {
        self.records()
            .into_iter()
            .filter(|r| r.entity.modification_state == ModificationState::Error)
            .map(|r| r.entity)
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.error_records().len()
    }

    /// Returns the record for `source_id`, ignoring error records
    pub fn find(&self, source_id: &str) -> Option<SinkRecord> {
        self.records().into_iter().find(|r| {
            r.entity.source_id == source_id && r.entity.modification_state != ModificationState::Error
        })
    }

    /// Number of times `finish` was called
    pub fn finish_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSink for MemorySink {
    async fn accept(&self, entity: DataEntity, content: Option<ContentStream>) -> SinkResult<()> {
        // Read before locking; the guard must not be held across an await.
        let content = match content {
            Some(mut stream) => Some(stream.read_to_end().await?),
            None => None,
        };
        self.lock()?.push(SinkRecord { entity, content });
        Ok(())
    }

    async fn finish(&self) -> SinkResult<()> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
