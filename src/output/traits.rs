//! Content sink trait and error types
//!
//! A sink receives every processed entity, successful or failed, through the
//! same `accept` call. Error records are data, not log noise.

use crate::source::ContentStream;
use crate::state::DataEntity;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while delivering entities to a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Receiver of processed entities
///
/// When one sink is shared across several concurrent crawl roots, the sink
/// is responsible for the thread-safety of concurrent `accept` calls.
#[async_trait]
pub trait ContentSink: Send + Sync {
    /// Accepts one entity and, for materialized entities, its content
    ///
    /// `Error`-state records arrive here as well, with `content` = None.
    /// A container is delivered before its children are listed, so when
    /// listing fails the same `source_id` arrives a second time as an
    /// `Error` record. The later record describes the final outcome.
    async fn accept(&self, entity: DataEntity, content: Option<ContentStream>) -> SinkResult<()>;

    /// Releases resources held by the sink
    async fn finish(&self) -> SinkResult<()> {
        Ok(())
    }
}
