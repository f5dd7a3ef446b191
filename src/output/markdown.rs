//! Markdown summary generation
//!
//! This module renders a human-readable summary of one invocation: every
//! configured source with its counters, followed by the recorded failures.

use crate::crawler::CrawlReport;
use crate::output::traits::SinkResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failures listed per source before the rest are elided
const MAX_LISTED_ERRORS: usize = 20;

/// Everything the summary reports about one invocation
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    /// Tracker run id, when change tracking is persistent
    pub run_id: Option<i64>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub config_hash: String,
    pub reports: Vec<CrawlReport>,
}

impl CrawlSummary {
    pub fn total_visited(&self) -> u64 {
        self.reports.iter().map(|r| r.visited).sum()
    }

    pub fn total_materialized(&self) -> u64 {
        self.reports.iter().map(|r| r.materialized).sum()
    }

    pub fn total_unmodified(&self) -> u64 {
        self.reports.iter().map(|r| r.unmodified).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.reports.iter().map(|r| r.errors.len()).sum()
    }

    /// Share of visited entities that failed, in percent
    pub fn error_rate(&self) -> f64 {
        let visited = self.total_visited();
        if visited == 0 {
            return 0.0;
        }
        (self.total_errors() as f64 / visited as f64) * 100.0
    }
}

/// Writes the markdown summary to `output_path`
pub fn generate_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> SinkResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Trawl Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    if let Some(run_id) = summary.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Sources**: {}\n", summary.reports.len()));
    md.push_str(&format!("- **Entities Visited**: {}\n", summary.total_visited()));
    md.push_str(&format!(
        "- **Materialized**: {}\n",
        summary.total_materialized()
    ));
    md.push_str(&format!("- **Unmodified**: {}\n", summary.total_unmodified()));
    md.push_str(&format!("- **Errors**: {}\n", summary.total_errors()));
    md.push_str(&format!("- **Error Rate**: {:.2}%\n\n", summary.error_rate()));

    if !summary.reports.is_empty() {
        md.push_str("## Sources\n\n");
        md.push_str("| Source | Visited | Materialized | Unmodified | Filtered | Errors | Elapsed | Outcome |\n");
        md.push_str("|--------|---------|--------------|------------|----------|--------|---------|---------|\n");
        for report in &summary.reports {
            let outcome = if report.cancelled {
                "cancelled"
            } else {
                "completed"
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {:.2}s | {} |\n",
                report.root,
                report.visited,
                report.materialized,
                report.unmodified,
                report.filtered,
                report.errors.len(),
                report.elapsed.as_secs_f64(),
                outcome
            ));
        }
        md.push('\n');
    }

    for report in summary.reports.iter().filter(|r| !r.errors.is_empty()) {
        md.push_str(&format!("## Errors in {}\n\n", report.root));
        md.push_str("| Entity | Error |\n");
        md.push_str("|--------|-------|\n");
        for error in report.errors.iter().take(MAX_LISTED_ERRORS) {
            md.push_str(&format!(
                "| {} | {} |\n",
                error.source_id,
                error.message.replace('|', "\\|")
            ));
        }
        if report.errors.len() > MAX_LISTED_ERRORS {
            md.push_str(&format!(
                "\n... and {} more\n",
                report.errors.len() - MAX_LISTED_ERRORS
            ));
        }
        md.push('\n');
    }

    md
}
