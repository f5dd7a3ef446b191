//! Crawl engine - the recursive traversal protocol
//!
//! Every entity goes through the same steps:
//! 1. Classify it against the change tracker
//! 2. Materialize its content unless it is unmodified, and push it to the sink
//! 3. Discover its children, unless that would exceed the depth bound
//! 4. Visit each child in discovery order, checking for cancellation first
//!
//! The traversal is depth-first, but runs on an explicit stack of open
//! containers instead of native recursion, so deep hierarchies cannot
//! exhaust the call stack. Each stack frame owns the lazy child stream of one
//! container; discovery therefore happens exactly once per entity.

use crate::crawler::fault::FaultIsolator;
use crate::crawler::{ChildStream, CrawlContext};
use crate::source::{AdapterRegistry, IdentityStability};
use crate::state::{DataEntity, ModificationState};
use crate::tracker::ChangeTracker;
use crate::{CrawlError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often progress is reported, in visited entities
const PROGRESS_INTERVAL: u64 = 100;

/// A failure recorded during a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSummary {
    pub source_id: String,
    pub message: String,
}

/// Counters and outcome of one top-level crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Source id of the root entity
    pub root: String,
    /// Entities that entered classification
    pub visited: u64,
    /// Entities whose content was read and delivered
    pub materialized: u64,
    /// Entities skipped because the tracker reported them unchanged
    pub unmodified: u64,
    /// Children rejected by the domain filter
    pub filtered: u64,
    /// Graph-kind children skipped because this crawl already visited them
    pub revisits: u64,
    pub errors: Vec<ErrorSummary>,
    /// True if the crawl stopped early because of cancellation
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl CrawlReport {
    fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            ..Self::default()
        }
    }

    fn record_error(&mut self, entity: &DataEntity, error: &CrawlError) {
        if error.is_aborted() {
            return;
        }
        self.errors.push(ErrorSummary {
            source_id: entity.source_id.clone(),
            message: error.to_string(),
        });
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// An open container whose children are being visited
struct Frame {
    parent: DataEntity,
    children: ChildStream,
}

/// Orchestrates adapters, change tracking and fault isolation
pub struct CrawlEngine {
    registry: AdapterRegistry,
    tracker: Arc<dyn ChangeTracker>,
}

impl CrawlEngine {
    pub fn new(registry: AdapterRegistry, tracker: Arc<dyn ChangeTracker>) -> Self {
        Self { registry, tracker }
    }

    /// Crawls everything reachable from `root`
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - the crawl finished or was cancelled cleanly
    /// * `Err(CrawlError::Aborted)` - `interrupt_on_error` is set and an
    ///   entity failed; its error record has already been delivered
    pub async fn run(&self, root: DataEntity, ctx: &CrawlContext) -> Result<CrawlReport> {
        let start = Instant::now();
        let mut report = CrawlReport::new(&root.source_id);
        tracing::info!("Starting crawl of {} ({})", root.source_id, root.kind);

        let outcome = self.traverse(root, ctx, &mut report).await;

        // Top-level only: release the shared sink, then wake anyone waiting
        // for the crawl to settle.
        if let Err(e) = ctx.content_handler().release().await {
            tracing::error!("Failed to release content sink: {}", e);
        }
        ctx.cancellation.settle();

        report.elapsed = start.elapsed();
        match &outcome {
            Ok(()) => tracing::info!(
                "Crawl of {} finished: {} visited, {} materialized, {} unmodified, {} filtered, {} revisits skipped, {} errors in {:?}",
                report.root,
                report.visited,
                report.materialized,
                report.unmodified,
                report.filtered,
                report.revisits,
                report.errors.len(),
                report.elapsed
            ),
            Err(e) => tracing::error!("Crawl of {} aborted: {}", report.root, e),
        }

        outcome.map(|()| report)
    }

    async fn traverse(
        &self,
        root: DataEntity,
        ctx: &CrawlContext,
        report: &mut CrawlReport,
    ) -> Result<()> {
        let start = Instant::now();
        let mut stack: Vec<Frame> = Vec::new();
        // Ids of graph-kind entities entered by this crawl; scoped to one
        // `run` so separate sources never share it.
        let mut entered: HashSet<String> = HashSet::new();

        self.first_entry(&root, &mut entered);
        if let Some(frame) = self.enter(root, ctx, report).await? {
            stack.push(frame);
        }

        while let Some(frame) = stack.last_mut() {
            if ctx.cancellation.is_cancelled() {
                tracing::info!(
                    "Crawl cancelled with {} open containers; no further children started",
                    stack.len()
                );
                report.cancelled = true;
                break;
            }

            let next = frame.children.next().await;
            let parent_depth = frame.parent.depth;

            match next {
                None => {
                    stack.pop();
                }
                Some(Err(e)) => {
                    // The stream cannot be resumed mid-way; the failure belongs
                    // to the container that was being enumerated.
                    if let Some(frame) = stack.pop() {
                        report.record_error(&frame.parent, &e);
                        let parent_ctx = ctx.with_depth(parent_depth);
                        FaultIsolator::handle(e, &frame.parent, &parent_ctx).await?;
                    }
                }
                Some(Ok(mut child)) => {
                    child.depth = parent_depth + 1;
                    child.parent_id = Some(frame.parent.source_id.clone());

                    if !ctx.admits(self.filter_key(&child)) {
                        report.filtered += 1;
                        ctx.log_skip(&child.source_id, "rejected by domain filter");
                        continue;
                    }

                    if !self.first_entry(&child, &mut entered) {
                        report.revisits += 1;
                        ctx.log_skip(&child.source_id, "already visited in this crawl");
                        continue;
                    }

                    if let Some(child_frame) = self.enter(child, ctx, report).await? {
                        stack.push(child_frame);
                    }

                    if report.visited % PROGRESS_INTERVAL == 0 {
                        let rate = report.visited as f64 / start.elapsed().as_secs_f64().max(0.001);
                        tracing::info!(
                            "Progress: {} entities visited, {} materialized, {} errors, depth {}, {:.2} entities/sec",
                            report.visited,
                            report.materialized,
                            report.errors.len(),
                            stack.len(),
                            rate
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Visits one entity under fault isolation
    ///
    /// Returns the frame for its children if it is an open container.
    async fn enter(
        &self,
        mut entity: DataEntity,
        ctx: &CrawlContext,
        report: &mut CrawlReport,
    ) -> Result<Option<Frame>> {
        let entity_ctx = ctx.with_depth(entity.depth);

        match self.visit(&mut entity, &entity_ctx, report).await {
            Ok(Some(children)) => Ok(Some(Frame {
                parent: entity,
                children,
            })),
            Ok(None) => Ok(None),
            Err(e) => {
                report.record_error(&entity, &e);
                FaultIsolator::handle(e, &entity, &entity_ctx).await?;
                Ok(None)
            }
        }
    }

    /// Classify, materialize and discover for a single entity
    async fn visit(
        &self,
        entity: &mut DataEntity,
        ctx: &CrawlContext,
        report: &mut CrawlReport,
    ) -> Result<Option<ChildStream>> {
        report.visited += 1;
        tracing::debug!("Visiting {} at depth {}", entity.source_id, entity.depth);

        let adapter = self.registry.get(entity.kind)?.clone();
        let key = tracker_key(entity, adapter.identity());

        entity.modification_state = self.classify(&key, entity);

        let mut retained = None;
        if entity.modification_state.needs_materialize() {
            let materialized = adapter.materialize(entity).await?;
            retained = materialized.retained;

            // Kept on the entity so discovery can see what materialize learned.
            entity.attributes.extend(materialized.metadata);
            ctx.content_handler()
                .deliver(entity.clone(), materialized.content)
                .await?;
            report.materialized += 1;
        } else {
            report.unmodified += 1;
            tracing::debug!("{} is unmodified, skipping materialize", entity.source_id);
        }

        if let Err(e) = self.tracker.record(&key, &entity.content_fingerprint) {
            tracing::warn!("Failed to record {} in change tracker: {}", entity.source_id, e);
        }

        // Enumeration can be costly, so the bound is checked before it starts.
        if !ctx.allows_children_of(entity.depth) || ctx.cancellation.is_cancelled() {
            return Ok(None);
        }

        let children = adapter
            .discover_children(entity, retained.as_deref(), ctx)
            .await?;
        Ok(Some(children))
    }

    /// The string the domain filter sees for `entity`
    fn filter_key<'a>(&self, entity: &'a DataEntity) -> &'a str {
        match self.registry.get(entity.kind) {
            Ok(adapter) => adapter.filter_key(entity),
            Err(_) => &entity.source_id,
        }
    }

    /// Returns false if `entity` is of a graph kind and was already entered
    fn first_entry(&self, entity: &DataEntity, entered: &mut HashSet<String>) -> bool {
        match self.registry.get(entity.kind) {
            Ok(adapter) if adapter.is_graph() => entered.insert(entity.source_id.clone()),
            _ => true,
        }
    }

    /// Asks the tracker for the entity's state, failing open toward `New`
    fn classify(&self, key: &str, entity: &DataEntity) -> ModificationState {
        match self.tracker.classify(key, &entity.content_fingerprint) {
            Ok(ModificationState::Error) => ModificationState::New,
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    "Change tracker failed for {}: {}; treating as new",
                    entity.source_id,
                    e
                );
                ModificationState::New
            }
        }
    }
}

/// Key under which an entity is tracked between crawls
///
/// Sources that cannot keep ids stable across sessions are tracked by
/// content fingerprint instead.
fn tracker_key(entity: &DataEntity, identity: IdentityStability) -> String {
    match identity {
        IdentityStability::Unstable if !entity.content_fingerprint.is_empty() => {
            format!("fingerprint:{}", entity.content_fingerprint)
        }
        _ => entity.source_id.clone(),
    }
}
