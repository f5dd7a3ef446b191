//! Running every configured source
//!
//! This module turns a [`Config`] into crawls, including:
//! - Building the adapter registry from the adapter settings
//! - Opening the change tracker and output database, and run bookkeeping
//! - One independent top-level crawl per `[[source]]`, each with its own
//!   context and cancellation child
//! - Writing the markdown summary

use crate::config::{Config, SinkMode, SourceEntry};
use crate::crawler::{CancellationToken, ContentHandlerFactory, CrawlContext, CrawlEngine};
use crate::output::{
    generate_markdown_summary, ContentSink, CrawlSummary, MemorySink, SinkResult, SqliteSink,
};
use crate::source::{
    AdapterRegistry, ContentStream, FeedAdapter, FilesystemAdapter, FilesystemOptions,
    FlatListAdapter, HttpFetcher, HyperlinkAdapter, HyperlinkOptions, MailboxAdapter,
    MaildirStore, PageFetcher,
};
use crate::state::{DataEntity, SourceKind};
use crate::tracker::{ChangeTracker, MemoryChangeTracker, RunStatus, SqliteChangeTracker};
use crate::{ConfigError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

/// How an invocation treats persistent state
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Forget all tracked fingerprints before crawling
    pub fresh: bool,
    /// Crawl into memory only: no tracker, database or summary file is
    /// touched
    pub dry_run: bool,
}

/// Registers one adapter per source kind, configured from `config`
pub fn build_registry(config: &Config) -> Result<AdapterRegistry> {
    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpFetcher::from_config(&config.user_agent, &config.hyperlink)?);

    Ok(AdapterRegistry::new()
        .with(Arc::new(FilesystemAdapter::new(FilesystemOptions::from(
            &config.filesystem,
        ))))
        .with(Arc::new(MailboxAdapter::new(Arc::new(MaildirStore::new()))))
        .with(Arc::new(HyperlinkAdapter::new(
            fetcher.clone(),
            HyperlinkOptions {
                allow_cross_origin: config.hyperlink.allow_cross_origin,
            },
        )))
        .with(Arc::new(FeedAdapter::new(fetcher)))
        .with(Arc::new(FlatListAdapter::new())))
}

/// Builds the root entity for a configured source
pub fn root_entity(source: &SourceEntry) -> Result<DataEntity> {
    let kind = source.source_kind().ok_or_else(|| {
        ConfigError::Validation(format!("Unknown source kind '{}'", source.kind))
    })?;

    match kind {
        // An unreadable root is still crawled, so its failure is recorded
        // like any other entity's.
        SourceKind::Filesystem => Ok(FilesystemAdapter::root_entity(&source.location)
            .unwrap_or_else(|e| {
                tracing::debug!("Cannot fingerprint {}: {}", source.location, e);
                DataEntity::root(kind, source.location.clone())
            })),
        SourceKind::Mailbox => Ok(MailboxAdapter::root_entity(source.location.clone())),
        SourceKind::Hyperlink => HyperlinkAdapter::root_entity(&source.location),
        SourceKind::Feed => FeedAdapter::root_entity(&source.location),
        SourceKind::FlatList => Ok(FlatListAdapter::root_entity(source.location.clone())),
    }
}

/// Per-entity view of the run's output sink
///
/// Finishing a handle leaves the underlying database open.
struct EntityHandle(Arc<dyn ContentSink>);

#[async_trait]
impl ContentSink for EntityHandle {
    async fn accept(&self, entity: DataEntity, content: Option<ContentStream>) -> SinkResult<()> {
        self.0.accept(entity, content).await
    }
}

fn content_handler(mode: SinkMode, sink: Arc<dyn ContentSink>) -> ContentHandlerFactory {
    match mode {
        SinkMode::Shared => ContentHandlerFactory::shared(sink),
        SinkMode::PerEntity => {
            ContentHandlerFactory::per_entity(move || Box::new(EntityHandle(sink.clone())))
        }
    }
}

/// Change tracking for one invocation
enum Tracking {
    Persistent(Arc<SqliteChangeTracker>),
    Ephemeral(Arc<MemoryChangeTracker>),
}

impl Tracking {
    fn open(config: &Config, options: &RunOptions) -> Result<Self> {
        if options.dry_run {
            return Ok(Self::Ephemeral(Arc::new(MemoryChangeTracker::new())));
        }

        let path = config
            .tracker
            .database_path
            .as_deref()
            .unwrap_or(&config.output.database_path);
        let tracker = SqliteChangeTracker::open(Path::new(path))?;
        if options.fresh {
            tracing::info!("Fresh crawl: forgetting tracked fingerprints in {}", path);
            tracker.clear()?;
        }
        Ok(Self::Persistent(Arc::new(tracker)))
    }

    fn handle(&self) -> Arc<dyn ChangeTracker> {
        match self {
            Self::Persistent(tracker) => tracker.clone(),
            Self::Ephemeral(tracker) => tracker.clone(),
        }
    }
}

/// Crawls every configured source in order
///
/// Sources are independent top-level crawls: each gets its own context and
/// a child of `cancel`, and one failing source does not stop the next.
/// `cancel` is settled once all sources have drained.
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - all sources ran or the crawl was cancelled
/// * `Err(CrawlError::Aborted)` - `interrupt-on-error` is set and an entity
///   failed; the summary has already been written
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    options: &RunOptions,
    cancel: CancellationToken,
) -> Result<CrawlSummary> {
    let outcome = run_sources(config, config_hash, options, &cancel).await;
    cancel.settle();
    outcome
}

async fn run_sources(
    config: &Config,
    config_hash: &str,
    options: &RunOptions,
    cancel: &CancellationToken,
) -> Result<CrawlSummary> {
    let tracking = Tracking::open(config, options)?;
    let run_id = match &tracking {
        Tracking::Persistent(tracker) => Some(tracker.start_run(config_hash)?),
        Tracking::Ephemeral(_) => None,
    };

    let sink: Arc<dyn ContentSink> = match run_id {
        Some(id) => Arc::new(SqliteSink::open(
            Path::new(&config.output.database_path),
            id,
        )?),
        None => Arc::new(MemorySink::new()),
    };

    let registry = build_registry(config)?;
    let filter = config.domain_filter()?;
    let engine = CrawlEngine::new(registry, tracking.handle());

    let mut summary = CrawlSummary {
        run_id,
        started_at: Utc::now().to_rfc3339(),
        config_hash: config_hash.to_string(),
        ..CrawlSummary::default()
    };
    let mut aborted = None;

    for source in &config.sources {
        if cancel.is_cancelled() {
            tracing::info!("Cancelled; not starting {} ({})", source.location, source.kind);
            break;
        }

        let root = match root_entity(source) {
            Ok(root) => root,
            Err(e) => {
                tracing::error!("Skipping source {}: {}", source.location, e);
                continue;
            }
        };

        if config.crawler.max_depth.is_none()
            && matches!(root.kind, SourceKind::Hyperlink | SourceKind::Feed)
        {
            tracing::warn!(
                "{} is crawled without max-depth; every page reachable from it is fetched once",
                source.location
            );
        }

        let ctx = CrawlContext::new(content_handler(config.crawler.sink_mode, sink.clone()))
            .with_max_depth(config.crawler.max_depth)
            .with_interrupt_on_error(config.crawler.interrupt_on_error)
            .with_verbose(config.crawler.verbose)
            .with_cancellation(cancel.child())
            .with_domain_filter(filter.clone());

        match engine.run(root, &ctx).await {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                aborted = Some(e);
                break;
            }
        }
    }

    // Per-entity handles never finish the database itself.
    if config.crawler.sink_mode == SinkMode::PerEntity {
        if let Err(e) = sink.finish().await {
            tracing::error!("Failed to finish output database: {}", e);
        }
    }

    let status = if aborted.is_some() {
        RunStatus::Failed
    } else if cancel.is_cancelled() || summary.reports.iter().any(|r| r.cancelled) {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    };
    summary.status = status.to_db_string().to_string();
    summary.finished_at = Some(Utc::now().to_rfc3339());

    if let (Tracking::Persistent(tracker), Some(id)) = (&tracking, run_id) {
        tracker.complete_run(id, status)?;
        if status == RunStatus::Completed {
            report_unseen(tracker, id);
        }
    }

    if !options.dry_run {
        let path = Path::new(&config.output.summary_path);
        generate_markdown_summary(&summary, path)?;
        tracing::info!("Summary written to {}", path.display());
    }

    match aborted {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

/// Logs entities tracked before but not reached by run `run_id`
fn report_unseen(tracker: &SqliteChangeTracker, run_id: i64) {
    match tracker.unseen_since(run_id) {
        Ok(unseen) if unseen.is_empty() => {}
        Ok(unseen) => {
            tracing::info!("{} previously tracked entities were not seen this run", unseen.len());
            for key in &unseen {
                tracing::debug!("Deletion candidate: {}", key);
            }
        }
        Err(e) => tracing::warn!("Failed to list unseen entities: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::output::load_statistics;
    use crate::state::ModificationState;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir, sources: &str, crawler: &str) -> Config {
        let toml = format!(
            r#"
[crawler]
{crawler}

[user-agent]
crawler-name = "TestTrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "{db}"
summary-path = "{summary}"

{sources}
"#,
            crawler = crawler,
            db = dir.path().join("out.db").display(),
            summary = dir.path().join("summary.md").display(),
            sources = sources,
        );
        parse_config(&toml).unwrap()
    }

    fn data_dir(dir: &TempDir) -> String {
        let data = dir.path().join("data");
        fs::create_dir_all(data.join("sub")).unwrap();
        fs::write(data.join("a.txt"), "alpha").unwrap();
        fs::write(data.join("sub/b.txt"), "beta").unwrap();
        data.to_string_lossy().into_owned()
    }

    fn filesystem_source(location: &str) -> String {
        format!("[[source]]\nkind = \"filesystem\"\nlocation = \"{}\"\n", location)
    }

    #[tokio::test]
    async fn test_second_run_is_incremental() {
        let dir = TempDir::new().unwrap();
        let data = data_dir(&dir);
        let config = config_for(&dir, &filesystem_source(&data), "");

        let first = run_crawl(&config, "hash", &RunOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.status, "completed");
        assert_eq!(first.total_materialized(), 4);
        assert!(dir.path().join("summary.md").exists());

        let second = run_crawl(&config, "hash", &RunOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.total_materialized(), 0);
        assert_eq!(second.total_unmodified(), 4);
        assert_ne!(first.run_id, second.run_id);

        let fresh = RunOptions {
            fresh: true,
            dry_run: false,
        };
        let third = run_crawl(&config, "hash", &fresh, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(third.total_materialized(), 4);

        let sink = SqliteSink::open(&dir.path().join("out.db"), 0).unwrap();
        let stats = load_statistics(&sink, third.run_id).unwrap();
        assert_eq!(stats.count(ModificationState::New), 4);
        assert_eq!(stats.total_content_bytes, 9);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let data = data_dir(&dir);
        let config = config_for(&dir, &filesystem_source(&data), "");
        let options = RunOptions {
            fresh: false,
            dry_run: true,
        };

        let summary = run_crawl(&config, "hash", &options, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.total_materialized(), 4);
        assert_eq!(summary.run_id, None);
        assert!(!dir.path().join("out.db").exists());
        assert!(!dir.path().join("summary.md").exists());
    }

    #[tokio::test]
    async fn test_sources_are_independent() {
        let dir = TempDir::new().unwrap();
        let data = data_dir(&dir);
        let missing = dir.path().join("missing").to_string_lossy().into_owned();
        let sources = format!("{}\n{}", filesystem_source(&missing), filesystem_source(&data));
        let config = config_for(&dir, &sources, "sink-mode = \"per-entity\"");

        let summary = run_crawl(&config, "hash", &RunOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].errors.len(), 1);
        assert_eq!(summary.reports[1].materialized, 4);
        assert_eq!(summary.status, "completed");
    }

    #[tokio::test]
    async fn test_interrupt_on_error_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing").to_string_lossy().into_owned();
        let data = data_dir(&dir);
        let sources = format!("{}\n{}", filesystem_source(&missing), filesystem_source(&data));
        let config = config_for(&dir, &sources, "interrupt-on-error = true");

        let err = run_crawl(&config, "hash", &RunOptions::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_aborted());

        let summary = fs::read_to_string(dir.path().join("summary.md")).unwrap();
        assert!(summary.contains("failed"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_settles() {
        let dir = TempDir::new().unwrap();
        let data = data_dir(&dir);
        let config = config_for(&dir, &filesystem_source(&data), "");
        let token = CancellationToken::new();
        token.cancel();

        let summary = run_crawl(&config, "hash", &RunOptions::default(), token.clone())
            .await
            .unwrap();
        assert!(summary.reports.is_empty());
        assert_eq!(summary.status, "interrupted");
        assert!(token.is_settled());
    }

    #[test]
    fn test_root_entities_by_kind() {
        let entry = |kind: &str, location: &str| SourceEntry {
            kind: kind.to_string(),
            location: location.to_string(),
        };

        let page = root_entity(&entry("hyperlink", "https://Example.com/#top")).unwrap();
        assert_eq!(page.kind, SourceKind::Hyperlink);
        assert_eq!(page.source_id, "https://example.com/");

        let list = root_entity(&entry("flat-list", "/tmp/list.txt")).unwrap();
        assert_eq!(list.kind, SourceKind::FlatList);

        let missing = root_entity(&entry("filesystem", "/definitely/not/here")).unwrap();
        assert_eq!(missing.content_fingerprint, "");

        assert!(root_entity(&entry("imap", "x")).is_err());
    }
}
