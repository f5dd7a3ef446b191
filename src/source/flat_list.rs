//! Flat lists of crawl targets
//!
//! A list file holds one target per line. Lines are trimmed; blank lines and
//! `#` comments are ignored. `http://` and `https://` lines become hyperlink
//! children, anything else is taken as a filesystem path. The list has no
//! content of its own.

use crate::crawler::{log_skip, ChildStream, CrawlContext, DiscoveryChannel, DiscoverySender};
use crate::source::filesystem::path_fingerprint;
use crate::source::{Materialized, SourceAdapter};
use crate::state::{DataEntity, SourceKind};
use crate::url::normalize_url;
use crate::{CrawlError, Result};
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Adapter for newline-separated target lists
#[derive(Debug, Clone, Default)]
pub struct FlatListAdapter;

impl FlatListAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn root_entity(path: impl Into<String>) -> DataEntity {
        DataEntity::root(SourceKind::FlatList, path)
    }

    /// Reads the list line by line; lines are never all held at once
    fn read_list(list: &DataEntity, verbose: bool, tx: &DiscoverySender) -> Result<()> {
        let file = File::open(&list.source_id).map_err(|e| CrawlError::io(&list.source_id, e))?;

        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| CrawlError::io(&list.source_id, e))?;
            let Some(child) = Self::parse_line(list, &line, number + 1, verbose) else {
                continue;
            };
            if !tx.offer(child) {
                break;
            }
        }
        Ok(())
    }

    fn parse_line(list: &DataEntity, line: &str, number: usize, verbose: bool) -> Option<DataEntity> {
        let target = line.trim();
        if target.is_empty() || target.starts_with('#') {
            return None;
        }

        let lowered = target.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            return match normalize_url(target) {
                Ok(url) => Some(DataEntity::child_of(list, SourceKind::Hyperlink, url.to_string())),
                Err(e) => {
                    log_skip(
                        verbose,
                        target,
                        &format!("line {} of {}: {}", number, list.source_id, e),
                    );
                    None
                }
            };
        }

        Some(
            DataEntity::child_of(list, SourceKind::Filesystem, target)
                .with_fingerprint(path_fingerprint(Path::new(target))),
        )
    }
}

#[async_trait]
impl SourceAdapter for FlatListAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::FlatList
    }

    async fn discover_children(
        &self,
        entity: &DataEntity,
        _retained: Option<&str>,
        ctx: &CrawlContext,
    ) -> Result<ChildStream> {
        let list = entity.clone();
        let verbose = ctx.verbose;
        Ok(DiscoveryChannel::spawn(
            entity.source_id.clone(),
            ctx.cancellation.clone(),
            move |tx| Self::read_list(&list, verbose, tx),
        ))
    }

    async fn materialize(&self, _entity: &DataEntity) -> Result<Materialized> {
        Ok(Materialized::none())
    }
}
