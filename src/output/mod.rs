//! Output module for processed entities and crawl reports
//!
//! This module handles:
//! - Content sinks receiving every processed entity (memory, SQLite)
//! - Statistics over the recorded entities
//! - Markdown summaries of an invocation

mod markdown;
mod memory;
mod sqlite_output;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_summary, generate_markdown_summary, CrawlSummary};
pub use memory::{MemorySink, SinkRecord};
pub use sqlite_output::SqliteSink;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{ContentSink, SinkError, SinkResult};
