//! Hyperlinked pages
//!
//! A page is both content and container: materialize fetches it, discovery
//! follows its links. The body read during materialize is retained so the
//! page is fetched only once per visit. Unmodified pages are fetched again
//! at discovery time, since their links must still be found.

use crate::crawler::{ChildStream, CrawlContext};
use crate::source::{
    parse_html, ContentStream, FetchedPage, Materialized, PageFetcher, SourceAdapter,
};
use crate::state::{Attributes, DataEntity, SourceKind};
use crate::url::{normalize_parsed, normalize_url, same_origin};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

pub(crate) const ATTR_STATUS: &str = "http.status";
pub(crate) const ATTR_CONTENT_TYPE: &str = "http.content-type";
pub(crate) const ATTR_FINAL_URL: &str = "http.final-url";
const ATTR_TITLE: &str = "html.title";

/// Link-following policy
#[derive(Debug, Clone, Default)]
pub struct HyperlinkOptions {
    /// Follow links whose origin differs from the linking page
    pub allow_cross_origin: bool,
}

/// Adapter for web pages reached over HTTP(S)
pub struct HyperlinkAdapter {
    fetcher: Arc<dyn PageFetcher>,
    options: HyperlinkOptions,
}

impl HyperlinkAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>, options: HyperlinkOptions) -> Self {
        Self { fetcher, options }
    }

    /// Builds the root entity for a start URL
    pub fn root_entity(url: &str) -> Result<DataEntity> {
        let url = normalize_url(url)?;
        Ok(DataEntity::root(SourceKind::Hyperlink, url.to_string()))
    }

    /// Child descriptors for the links of an HTML body
    fn links_of(&self, entity: &DataEntity, base: &str, body: &str, ctx: &CrawlContext) -> Vec<DataEntity> {
        let base_url = match Url::parse(base) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot resolve links of {}: {}", entity.source_id, e);
                return Vec::new();
            }
        };

        let parsed = parse_html(body, &base_url);
        let mut seen = HashSet::new();
        let mut children = Vec::new();

        for mut link in parsed.links {
            if normalize_parsed(&mut link).is_err() {
                continue;
            }

            if !self.options.allow_cross_origin && !same_origin(&base_url, &link) {
                ctx.log_skip(link.as_str(), "cross-origin link");
                continue;
            }

            let id = link.to_string();
            // Self and back links would only re-enter the same subtree.
            if id == entity.source_id || Some(&id) == entity.parent_id.as_ref() {
                continue;
            }
            if seen.insert(id.clone()) {
                children.push(DataEntity::child_of(entity, SourceKind::Hyperlink, id));
            }
        }

        tracing::debug!(
            "Found {} links on {} ({} followed)",
            seen.len(),
            entity.source_id,
            children.len()
        );
        children
    }
}

/// Metadata attached to a fetched page
pub(crate) fn page_metadata(page: &FetchedPage) -> Attributes {
    Attributes::new()
        .with(ATTR_STATUS, page.status.to_string())
        .with(ATTR_CONTENT_TYPE, page.content_type.clone())
        .with(ATTR_FINAL_URL, page.final_url.clone())
}

/// Content stream for a fetched body, typed by its MIME type
pub(crate) fn page_content(page: &FetchedPage) -> ContentStream {
    let stream = ContentStream::from_bytes(page.body.clone());
    match page.mime_type() {
        "" => stream,
        mime => stream.with_mime_type(mime),
    }
}

#[async_trait]
impl SourceAdapter for HyperlinkAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Hyperlink
    }

    fn is_graph(&self) -> bool {
        true
    }

    async fn discover_children(
        &self,
        entity: &DataEntity,
        retained: Option<&str>,
        ctx: &CrawlContext,
    ) -> Result<ChildStream> {
        if let Some(body) = retained {
            let base = entity
                .attributes
                .get(ATTR_FINAL_URL)
                .unwrap_or(entity.source_id.as_str());
            return Ok(ChildStream::from_vec(self.links_of(entity, base, body, ctx)));
        }

        // Materialized this visit without retaining a body: not HTML.
        if entity.modification_state.needs_materialize() {
            return Ok(ChildStream::empty());
        }

        let page = self.fetcher.fetch(&entity.source_id).await?;
        if !page.is_html() {
            return Ok(ChildStream::empty());
        }
        let children = self.links_of(entity, &page.final_url, &page.text(), ctx);
        Ok(ChildStream::from_vec(children))
    }

    async fn materialize(&self, entity: &DataEntity) -> Result<Materialized> {
        let page = self.fetcher.fetch(&entity.source_id).await?;
        let mut metadata = page_metadata(&page);

        if !page.is_html() {
            return Ok(Materialized::content(page_content(&page), metadata));
        }

        let base = Url::parse(&page.final_url).map_err(|e| {
            CrawlError::format(&entity.source_id, format!("invalid final URL: {}", e))
        })?;
        let text = page.text();
        if let Some(title) = parse_html(&text, &base).title {
            metadata.insert(ATTR_TITLE, title);
        }

        Ok(Materialized {
            content: Some(page_content(&page)),
            metadata,
            retained: Some(text),
        })
    }
}
