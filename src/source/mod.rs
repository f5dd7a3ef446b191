//! Source adapters
//!
//! An adapter knows how to enumerate and read one kind of source. The engine
//! only ever calls through [`SourceAdapter`]; what counts as a directory,
//! a mail folder or a linked page is decided here, including each variant's
//! admissibility rules (hidden files, symlinks, deleted messages,
//! same-origin links).

mod content;
mod feed;
mod fetcher;
mod filesystem;
mod flat_list;
mod hyperlink;
mod mailbox;
mod maildir;
mod parser;

pub use content::ContentStream;
pub use feed::{parse_feed, FeedAdapter, FeedItem};
pub use fetcher::{build_http_client, FetchedPage, HttpFetcher, PageFetcher};
pub use filesystem::{FilesystemAdapter, FilesystemOptions};
pub use flat_list::FlatListAdapter;
pub use hyperlink::{HyperlinkAdapter, HyperlinkOptions};
pub use mailbox::{FolderType, MailStore, MailboxAdapter, MessageFlags, MessageInfo};
pub use maildir::MaildirStore;
pub use parser::{parse_html, ParsedPage};

use crate::crawler::{ChildStream, CrawlContext};
use crate::state::{Attributes, DataEntity, SourceKind};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Whether ids assigned by a source survive across sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStability {
    /// `source_id` identifies the same entity in every crawl
    Stable,
    /// Ids may be reassigned; change tracking keys on the fingerprint instead
    Unstable,
}

/// Result of reading an entity's own content
#[derive(Debug, Default)]
pub struct Materialized {
    /// None for containers without content of their own
    pub content: Option<ContentStream>,
    /// Supplemental metadata merged into the entity's attributes
    pub metadata: Attributes,
    /// A body the adapter already read and can reuse for discovery
    pub retained: Option<String>,
}

impl Materialized {
    /// The no-op result for pure containers
    pub fn none() -> Self {
        Self::default()
    }

    pub fn content(content: ContentStream, metadata: Attributes) -> Self {
        Self {
            content: Some(content),
            metadata,
            retained: None,
        }
    }
}

/// Capability implementation for one kind of source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The entity kind this adapter handles
    fn kind(&self) -> SourceKind;

    fn identity(&self) -> IdentityStability {
        IdentityStability::Stable
    }

    /// The string the domain filter is applied to
    ///
    /// Defaults to the source id. Adapters whose ids are not locations
    /// return the location the entity stands for.
    fn filter_key<'a>(&self, entity: &'a DataEntity) -> &'a str {
        &entity.source_id
    }

    /// True if entities of this kind form a graph rather than a tree
    ///
    /// The engine visits each id of such a kind at most once per top-level
    /// crawl.
    fn is_graph(&self) -> bool {
        false
    }

    /// Enumerates the children of `entity`
    ///
    /// Each variant applies its own admissibility filters before yielding a
    /// descriptor. `retained` is the body kept by a preceding
    /// [`SourceAdapter::materialize`] call on the same entity, if any.
    async fn discover_children(
        &self,
        entity: &DataEntity,
        retained: Option<&str>,
        ctx: &CrawlContext,
    ) -> Result<ChildStream>;

    /// Produces the entity's content stream and supplemental metadata
    async fn materialize(&self, entity: &DataEntity) -> Result<Materialized>;
}

/// Maps entity kinds to the adapters that handle them
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own kind, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, kind: SourceKind) -> Result<&Arc<dyn SourceAdapter>> {
        self.adapters.get(&kind).ok_or(CrawlError::NoAdapter(kind))
    }

    pub fn kinds(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.adapters.keys().copied()
    }
}
