//! Crawl context passed through the whole traversal
//!
//! The context is read-mostly and cheap to clone. The only shared mutable
//! piece is the cancellation token, plus the sink when it is configured as
//! shared. Depth is an explicit per-call value, never mutated in place.

use crate::crawler::CancellationToken;
use crate::output::{ContentSink, SinkResult};
use crate::source::ContentStream;
use crate::state::DataEntity;
use crate::url::DomainFilter;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a discovered source id may be visited
pub type FilterFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Where processed entities go
#[derive(Clone)]
pub enum ContentHandlerFactory {
    /// One sink for the whole crawl, finished when the top-level call ends
    Shared(Arc<dyn ContentSink>),
    /// A fresh sink per entity, finished right after its single accept
    PerEntity(Arc<dyn Fn() -> Box<dyn ContentSink> + Send + Sync>),
}

impl ContentHandlerFactory {
    pub fn shared(sink: Arc<dyn ContentSink>) -> Self {
        Self::Shared(sink)
    }

    pub fn per_entity<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn ContentSink> + Send + Sync + 'static,
    {
        Self::PerEntity(Arc::new(factory))
    }

    /// Pushes one entity into the configured sink
    pub async fn deliver(&self, entity: DataEntity, content: Option<ContentStream>) -> SinkResult<()> {
        match self {
            Self::Shared(sink) => sink.accept(entity, content).await,
            Self::PerEntity(factory) => {
                let sink = factory();
                let accepted = sink.accept(entity, content).await;
                let finished = sink.finish().await;
                accepted.and(finished)
            }
        }
    }

    /// Releases the shared sink at the end of a top-level crawl
    pub async fn release(&self) -> SinkResult<()> {
        match self {
            Self::Shared(sink) => sink.finish().await,
            Self::PerEntity(_) => Ok(()),
        }
    }
}

impl fmt::Debug for ContentHandlerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(_) => f.write_str("ContentHandlerFactory::Shared"),
            Self::PerEntity(_) => f.write_str("ContentHandlerFactory::PerEntity"),
        }
    }
}

/// Settings and shared handles for one top-level crawl
#[derive(Clone)]
pub struct CrawlContext {
    /// None means unbounded
    pub max_depth: Option<u32>,
    pub interrupt_on_error: bool,
    pub verbose: bool,
    pub cancellation: CancellationToken,
    domain_filter: FilterFn,
    content_handler: ContentHandlerFactory,
    depth: u32,
}

impl CrawlContext {
    /// Creates a context with defaults: unbounded depth, no interrupt on
    /// error, quiet, accept-all filter and a fresh cancellation token
    pub fn new(content_handler: ContentHandlerFactory) -> Self {
        Self {
            max_depth: None,
            interrupt_on_error: false,
            verbose: false,
            cancellation: CancellationToken::new(),
            domain_filter: Arc::new(|_| true),
            content_handler,
            depth: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<u32>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_interrupt_on_error(mut self, interrupt: bool) -> Self {
        self.interrupt_on_error = interrupt;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_domain_filter(mut self, filter: DomainFilter) -> Self {
        self.domain_filter = Arc::new(move |id| filter.admits(id));
        self
    }

    pub fn with_filter_fn<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.domain_filter = Arc::new(filter);
        self
    }

    /// Depth of the entity this context is handed to
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The context for an entity at `depth`
    pub fn with_depth(&self, depth: u32) -> Self {
        Self {
            depth,
            ..self.clone()
        }
    }

    /// Applies the shared domain filter to a source id
    pub fn admits(&self, source_id: &str) -> bool {
        (self.domain_filter)(source_id)
    }

    /// A thread-safe handle to the filter, for blocking producers
    pub fn filter_fn(&self) -> FilterFn {
        self.domain_filter.clone()
    }

    /// Returns true if children of an entity at `depth` are within bounds
    pub fn allows_children_of(&self, depth: u32) -> bool {
        match self.max_depth {
            Some(max) => depth < max,
            None => true,
        }
    }

    pub fn content_handler(&self) -> &ContentHandlerFactory {
        &self.content_handler
    }

    /// Logs a filter or admissibility skip; informational only when verbose
    pub fn log_skip(&self, source_id: &str, reason: &str) {
        log_skip(self.verbose, source_id, reason);
    }
}

/// Skip logging usable from blocking producers that only carry the flag
pub fn log_skip(verbose: bool, source_id: &str, reason: &str) {
    if verbose {
        tracing::info!("Skipping {}: {}", source_id, reason);
    } else {
        tracing::debug!("Skipping {}: {}", source_id, reason);
    }
}

impl fmt::Debug for CrawlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlContext")
            .field("max_depth", &self.max_depth)
            .field("interrupt_on_error", &self.interrupt_on_error)
            .field("verbose", &self.verbose)
            .field("depth", &self.depth)
            .field("content_handler", &self.content_handler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;

    fn context() -> CrawlContext {
        CrawlContext::new(ContentHandlerFactory::shared(Arc::new(MemorySink::new())))
    }

    #[test]
    fn test_defaults() {
        let ctx = context();
        assert_eq!(ctx.max_depth, None);
        assert!(!ctx.interrupt_on_error);
        assert!(!ctx.verbose);
        assert!(ctx.admits("anything"));
        assert!(ctx.allows_children_of(10_000));
    }

    #[test]
    fn test_depth_bound_checked_before_discovery() {
        let ctx = context().with_max_depth(Some(1));
        assert!(ctx.allows_children_of(0));
        assert!(!ctx.allows_children_of(1));

        let ctx = context().with_max_depth(Some(0));
        assert!(!ctx.allows_children_of(0));
    }

    #[test]
    fn test_with_depth_does_not_touch_original() {
        let ctx = context();
        let child = ctx.with_depth(3);
        assert_eq!(ctx.depth(), 0);
        assert_eq!(child.depth(), 3);
    }

    #[test]
    fn test_clones_share_cancellation() {
        let ctx = context();
        let child = ctx.with_depth(1);
        ctx.cancellation.cancel();
        assert!(child.cancellation.is_cancelled());
    }

    #[test]
    fn test_filter_fn() {
        let ctx = context().with_filter_fn(|id| !id.contains("private"));
        assert!(ctx.admits("/data/public"));
        assert!(!ctx.admits("/data/private/x"));
    }

    #[tokio::test]
    async fn test_per_entity_sinks_are_fresh() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let factory = ContentHandlerFactory::per_entity(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(MemorySink::new())
        });

        let entity = DataEntity::root(crate::state::SourceKind::Filesystem, "/a");
        factory.deliver(entity.clone(), None).await.unwrap();
        factory.deliver(entity, None).await.unwrap();
        factory.release().await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }
}
