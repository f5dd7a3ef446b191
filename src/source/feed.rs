//! RSS and Atom feeds
//!
//! A feed is a container of feed items; each item is a small entity whose
//! content is its summary and whose only child is the page it links to.
//! Items are told apart from feeds by the `feed.role` attribute set at
//! discovery.

use crate::crawler::{ChildStream, CrawlContext};
use crate::source::hyperlink::{page_content, page_metadata};
use crate::source::{ContentStream, Materialized, PageFetcher, SourceAdapter};
use crate::state::{Attributes, DataEntity, SourceKind};
use crate::url::normalize_url;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

const ATTR_ROLE: &str = "feed.role";
const ATTR_TITLE: &str = "feed.title";
const ATTR_LINK: &str = "feed.link";
const ATTR_SUMMARY: &str = "feed.summary";
const ROLE_ITEM: &str = "item";

fn element(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}\s*>")).expect("static element pattern")
}

lazy_static! {
    static ref RSS_ITEM: Regex = element("item");
    static ref ATOM_ENTRY: Regex = element("entry");
    static ref TITLE: Regex = element("title");
    static ref LINK: Regex = element("link");
    static ref GUID: Regex = element("guid");
    static ref ID: Regex = element("id");
    static ref DESCRIPTION: Regex = element("description");
    static ref SUMMARY: Regex = element("summary");
    static ref CONTENT: Regex = element("content");
    static ref PUB_DATE: Regex = element("pubDate");
    static ref UPDATED: Regex = element("updated");
    static ref PUBLISHED: Regex = element("published");
    static ref ATOM_LINK: Regex = Regex::new(r#"(?is)<link\b([^>]*?)/?>"#).expect("static link pattern");
    static ref HREF: Regex = Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']*)["']"#).expect("static href pattern");
    static ref REL: Regex = Regex::new(r#"(?i)\brel\s*=\s*["']([^"']*)["']"#).expect("static rel pattern");
    static ref CDATA: Regex = Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("static cdata pattern");
}

/// One item of an RSS or Atom feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    /// `guid` (RSS) or `id` (Atom)
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    /// `pubDate`, `updated` or `published`, verbatim
    pub published: Option<String>,
}

impl FeedItem {
    /// Identifier used as the item's source id
    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref().or(self.link.as_deref())
    }
}

/// Extracts the items of an RSS 2.0 or Atom document
///
/// Parsing is tolerant: unknown elements are ignored and items without an
/// id or link are dropped.
pub fn parse_feed(xml: &str) -> Vec<FeedItem> {
    RSS_ITEM
        .captures_iter(xml)
        .chain(ATOM_ENTRY.captures_iter(xml))
        .filter_map(|caps| caps.get(1))
        .map(|block| parse_item(block.as_str()))
        .filter(|item| item.identity().is_some())
        .collect()
}

fn parse_item(block: &str) -> FeedItem {
    FeedItem {
        id: first_text(block, &[&GUID, &ID]),
        title: first_text(block, &[&TITLE]),
        link: first_text(block, &[&LINK]).or_else(|| atom_link(block)),
        summary: first_text(block, &[&DESCRIPTION, &SUMMARY, &CONTENT]),
        published: first_text(block, &[&PUB_DATE, &UPDATED, &PUBLISHED]),
    }
}

fn first_text(block: &str, patterns: &[&Regex]) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(block)
            .and_then(|caps| caps.get(1))
            .map(|m| clean_text(m.as_str()))
            .filter(|text| !text.is_empty())
    })
}

/// The `href` of an Atom `<link/>`, preferring `rel="alternate"`
fn atom_link(block: &str) -> Option<String> {
    let mut fallback = None;
    for caps in ATOM_LINK.captures_iter(block) {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let Some(href) = HREF.captures(attrs).and_then(|c| c.get(1)) else {
            continue;
        };
        let href = decode_entities(href.as_str());
        match REL.captures(attrs).and_then(|c| c.get(1)).map(|m| m.as_str()) {
            None | Some("alternate") => return Some(href),
            Some(_) => {
                fallback.get_or_insert(href);
            }
        }
    }
    fallback
}

fn clean_text(raw: &str) -> String {
    let unwrapped = CDATA.replace_all(raw, "$1");
    decode_entities(unwrapped.trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Adapter for feeds and their items
pub struct FeedAdapter {
    fetcher: Arc<dyn PageFetcher>,
}

impl FeedAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn root_entity(url: &str) -> Result<DataEntity> {
        let url = normalize_url(url)?;
        Ok(DataEntity::root(SourceKind::Feed, url.to_string()))
    }

    fn is_item(entity: &DataEntity) -> bool {
        entity.attributes.get(ATTR_ROLE) == Some(ROLE_ITEM)
    }

    fn items_of(feed: &DataEntity, xml: &str) -> Vec<DataEntity> {
        let items = parse_feed(xml);
        tracing::debug!("Feed {} lists {} items", feed.source_id, items.len());

        items
            .into_iter()
            .filter_map(|item| {
                let id = item.identity()?.to_string();
                let mut child = DataEntity::child_of(feed, SourceKind::Feed, id)
                    .with_fingerprint(item.published.clone().unwrap_or_default())
                    .with_attribute(ATTR_ROLE, ROLE_ITEM);
                if let Some(title) = item.title {
                    child.attributes.insert(ATTR_TITLE, title);
                }
                if let Some(link) = item.link {
                    child.attributes.insert(ATTR_LINK, link);
                }
                if let Some(summary) = item.summary {
                    child.attributes.insert(ATTR_SUMMARY, summary);
                }
                Some(child)
            })
            .collect()
    }

    /// The linked page of a feed item, if it has a usable link
    fn linked_page(item: &DataEntity, ctx: &CrawlContext) -> Vec<DataEntity> {
        let Some(link) = item.attributes.get(ATTR_LINK) else {
            return Vec::new();
        };
        match normalize_url(link) {
            Ok(url) => vec![DataEntity::child_of(item, SourceKind::Hyperlink, url.to_string())],
            Err(e) => {
                ctx.log_skip(link, &format!("unusable item link: {}", e));
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    /// Items are filtered by the page they link to, since guids such as
    /// `urn:uuid:` have no host.
    fn filter_key<'a>(&self, entity: &'a DataEntity) -> &'a str {
        if Self::is_item(entity) {
            if let Some(link) = entity.attributes.get(ATTR_LINK) {
                return link;
            }
        }
        &entity.source_id
    }

    async fn discover_children(
        &self,
        entity: &DataEntity,
        retained: Option<&str>,
        ctx: &CrawlContext,
    ) -> Result<ChildStream> {
        if Self::is_item(entity) {
            return Ok(ChildStream::from_vec(Self::linked_page(entity, ctx)));
        }

        let children = match retained {
            Some(xml) => Self::items_of(entity, xml),
            None => {
                let page = self.fetcher.fetch(&entity.source_id).await?;
                Self::items_of(entity, &page.text())
            }
        };
        Ok(ChildStream::from_vec(children))
    }

    async fn materialize(&self, entity: &DataEntity) -> Result<Materialized> {
        if Self::is_item(entity) {
            let summary = entity.attributes.get(ATTR_SUMMARY).unwrap_or_default();
            return Ok(Materialized::content(
                ContentStream::from_bytes(summary.to_string()).with_mime_type("text/plain"),
                Attributes::new(),
            ));
        }

        let page = self.fetcher.fetch(&entity.source_id).await?;
        Ok(Materialized {
            content: Some(page_content(&page)),
            metadata: page_metadata(&page),
            retained: Some(page.text()),
        })
    }
}
