//! Statistics generation from the output database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the `entity_records` table.

use crate::output::sqlite_output::SqliteSink;
use crate::output::traits::SinkResult;
use crate::state::ModificationState;
use std::collections::HashMap;

/// Errors shown by [`print_statistics`]
const ERROR_SAMPLE: usize = 10;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Run the statistics cover; None means all runs
    pub run_id: Option<i64>,

    /// Total number of records, including error records
    pub total_records: u64,

    /// Count of records by modification state
    pub records_by_state: HashMap<ModificationState, u64>,

    /// Count of records by source kind
    pub records_by_kind: HashMap<String, u64>,

    /// Sum of content lengths
    pub total_content_bytes: u64,

    pub max_depth: u32,

    /// First few failures as (source id, message)
    pub sample_errors: Vec<(String, String)>,
}

impl CrawlStatistics {
    pub fn count(&self, state: ModificationState) -> u64 {
        self.records_by_state.get(&state).copied().unwrap_or(0)
    }
}

/// Loads statistics for `run_id`, or for the latest run when None
pub fn load_statistics(sink: &SqliteSink, run_id: Option<i64>) -> SinkResult<CrawlStatistics> {
    let run_id = match run_id {
        Some(id) => Some(id),
        None => sink.latest_run()?,
    };

    let (total_content_bytes, max_depth) = sink.content_totals(run_id)?;

    Ok(CrawlStatistics {
        run_id,
        total_records: sink.count_records(run_id)?,
        records_by_state: sink.count_by_state(run_id)?,
        records_by_kind: sink.count_by_kind(run_id)?,
        total_content_bytes,
        max_depth,
        sample_errors: sink.error_messages(run_id, ERROR_SAMPLE)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    match stats.run_id {
        Some(id) => println!("  Run: {}", id),
        None => println!("  Run: (none recorded)"),
    }
    println!("  Total records: {}", stats.total_records);
    println!("  Content bytes: {}", stats.total_content_bytes);
    println!("  Deepest entity: {}", stats.max_depth);
    println!();

    println!("Records by State:");
    for state in ModificationState::all_states() {
        let count = stats.count(state);
        let percentage = if stats.total_records > 0 {
            (count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.records_by_kind.is_empty() {
        println!("Records by Kind:");
        let mut kinds: Vec<_> = stats.records_by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (kind, count) in kinds {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if !stats.sample_errors.is_empty() {
        println!("Errors (first {}):", stats.sample_errors.len());
        for (source_id, message) in &stats.sample_errors {
            println!("  - {}: {}", source_id, message);
        }
        println!();
    }

    let failed = stats.count(ModificationState::Error);
    let succeeded = stats.total_records.saturating_sub(failed);
    let success_rate = if stats.total_records > 0 {
        (succeeded as f64 / stats.total_records as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} records without error)",
        success_rate, succeeded, stats.total_records
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ContentSink;
    use crate::source::ContentStream;
    use crate::state::{DataEntity, SourceKind};

    #[tokio::test]
    async fn test_load_statistics_defaults_to_latest_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.db");
        let first = SqliteSink::open(&path, 1).unwrap();
        first
            .accept(DataEntity::root(SourceKind::Filesystem, "/a"), None)
            .await
            .unwrap();
        drop(first);

        let second = SqliteSink::open(&path, 2).unwrap();
        let root = DataEntity::root(SourceKind::Filesystem, "/b");
        second
            .accept(
                DataEntity::child_of(&root, SourceKind::Filesystem, "/b/c"),
                Some(ContentStream::from_bytes("1234")),
            )
            .await
            .unwrap();
        second
            .accept(root.error_record("gone".to_string(), String::new()), None)
            .await
            .unwrap();

        let stats = load_statistics(&second, None).unwrap();
        assert_eq!(stats.run_id, Some(2));
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.count(ModificationState::Error), 1);
        assert_eq!(stats.count(ModificationState::New), 1);
        assert_eq!(stats.total_content_bytes, 4);
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.sample_errors[0].0, "/b");

        let first_run = load_statistics(&second, Some(1)).unwrap();
        assert_eq!(first_run.total_records, 1);
    }

    #[test]
    fn test_empty_statistics() {
        let sink = SqliteSink::open_in_memory(0).unwrap();
        let stats = load_statistics(&sink, None).unwrap();
        assert_eq!(stats.run_id, None);
        assert_eq!(stats.total_records, 0);
        print_statistics(&stats);
    }
}
