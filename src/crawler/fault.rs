//! Per-entity fault isolation
//!
//! A failing entity becomes an `Error` record pushed through the regular
//! sink path. Siblings keep going unless the context asks to interrupt on
//! error, in which case the failure is escalated to a crawl-wide abort.

use crate::crawler::CrawlContext;
use crate::state::DataEntity;
use crate::{CrawlError, Result};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

/// Converts entity failures into error records
pub struct FaultIsolator;

impl FaultIsolator {
    /// Records `error` against `entity` and applies the interrupt policy
    ///
    /// # Returns
    ///
    /// * `Ok(())` - the error was recorded and the crawl continues
    /// * `Err(CrawlError::Aborted)` - `interrupt_on_error` is set
    pub async fn handle(error: CrawlError, entity: &DataEntity, ctx: &CrawlContext) -> Result<()> {
        // Already escalated further down; never record it twice.
        if error.is_aborted() {
            return Err(error);
        }

        let message = error.to_string();
        tracing::warn!("Error processing {}: {}", entity.source_id, message);

        let record = entity.error_record(message, format_stacktrace(&error));
        if let Err(e) = ctx.content_handler().deliver(record, None).await {
            tracing::error!(
                "Failed to deliver error record for {}: {}",
                entity.source_id,
                e
            );
        }

        if ctx.interrupt_on_error {
            return Err(CrawlError::Aborted {
                source_id: entity.source_id.clone(),
                cause: Box::new(error),
            });
        }

        Ok(())
    }
}

/// Formats an error, its source chain and, when enabled, a backtrace
///
/// Backtraces are only captured when `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE`
/// is set.
pub fn format_stacktrace(error: &(dyn StdError + 'static)) -> String {
    let mut trace = format!("Error: {}", error);

    let mut source = error.source();
    let mut level = 0;
    while let Some(cause) = source {
        trace.push_str(&format!("\n  {}: {}", level, cause));
        source = cause.source();
        level += 1;
    }

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        trace.push_str("\n\nStack backtrace:\n");
        trace.push_str(&backtrace.to_string());
    }

    trace
}
