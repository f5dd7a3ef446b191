//! Local filesystem trees
//!
//! Directories are containers without content; regular files are leaves
//! whose content is the open file. Directory listings can be arbitrarily
//! large, so they are produced through a [`DiscoveryChannel`].

use crate::crawler::{log_skip, ChildStream, CrawlContext, DiscoveryChannel, DiscoverySender};
use crate::source::{ContentStream, Materialized, SourceAdapter};
use crate::state::{Attributes, DataEntity, SourceKind};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::{self, File, Metadata};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Directory suffixes treated as opaque application bundles
const BUNDLE_SUFFIXES: &[&str] = &[".app", ".bundle", ".framework"];

/// Admissibility rules for directory entries
#[derive(Debug, Clone)]
pub struct FilesystemOptions {
    pub follow_symlinks: bool,
    /// Skip entries whose name starts with `.`
    pub ignore_hidden: bool,
    pub skip_bundles: bool,
}

impl Default for FilesystemOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_hidden: true,
            skip_bundles: true,
        }
    }
}

impl From<&crate::config::FilesystemConfig> for FilesystemOptions {
    fn from(config: &crate::config::FilesystemConfig) -> Self {
        Self {
            follow_symlinks: config.follow_symlinks,
            ignore_hidden: config.ignore_hidden,
            skip_bundles: config.skip_bundles,
        }
    }
}

/// Adapter for files and directories on local disk
#[derive(Debug, Clone, Default)]
pub struct FilesystemAdapter {
    options: FilesystemOptions,
}

impl FilesystemAdapter {
    pub fn new(options: FilesystemOptions) -> Self {
        Self { options }
    }

    /// Builds the root entity for a path, fingerprinted like any child
    pub fn root_entity(path: impl AsRef<Path>) -> Result<DataEntity> {
        let path = path.as_ref();
        let id = path.to_string_lossy().into_owned();
        let metadata = fs::metadata(path).map_err(|e| CrawlError::io(&id, e))?;
        Ok(DataEntity::root(SourceKind::Filesystem, id).with_fingerprint(fingerprint(&metadata)))
    }

    /// Lists one directory, offering admissible entries as they are read
    ///
    /// Entries come in the order the platform returns them. At most one
    /// entry is held at a time, however large the directory.
    fn list_directory(
        options: &FilesystemOptions,
        parent: &DataEntity,
        verbose: bool,
        tx: &DiscoverySender,
    ) -> Result<()> {
        let dir = Path::new(&parent.source_id);
        let entries = fs::read_dir(dir).map_err(|e| CrawlError::io(&parent.source_id, e))?;
        Self::offer_entries(
            options,
            parent,
            entries.map(|entry| entry.map(|e| e.path())),
            verbose,
            tx,
        );
        Ok(())
    }

    /// Pulls entries one at a time until the consumer stops taking them
    fn offer_entries<I>(
        options: &FilesystemOptions,
        parent: &DataEntity,
        entries: I,
        verbose: bool,
        tx: &DiscoverySender,
    ) where
        I: Iterator<Item = std::io::Result<PathBuf>>,
    {
        for entry in entries {
            if tx.is_cancelled() {
                break;
            }
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    log_skip(verbose, &parent.source_id, &format!("unreadable entry: {}", e));
                    continue;
                }
            };
            let id = path.to_string_lossy().into_owned();
            let Some(metadata) = Self::admissible(options, &path, &id, verbose) else {
                continue;
            };
            let child = DataEntity::child_of(parent, SourceKind::Filesystem, id)
                .with_fingerprint(fingerprint(&metadata));
            if !tx.offer(child) {
                break;
            }
        }
    }

    /// Returns the entry's metadata if it may be visited
    fn admissible(options: &FilesystemOptions, path: &Path, id: &str, verbose: bool) -> Option<Metadata> {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();

        if options.ignore_hidden && name.starts_with('.') {
            log_skip(verbose, id, "hidden entry");
            return None;
        }

        let link_meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                log_skip(verbose, id, &format!("cannot stat: {}", e));
                return None;
            }
        };

        let metadata = if link_meta.file_type().is_symlink() {
            if !options.follow_symlinks {
                log_skip(verbose, id, "symbolic link");
                return None;
            }
            match fs::metadata(path) {
                Ok(meta) => meta,
                Err(e) => {
                    log_skip(verbose, id, &format!("dangling symbolic link: {}", e));
                    return None;
                }
            }
        } else {
            link_meta
        };

        if options.skip_bundles && metadata.is_dir() && is_bundle(&name) {
            log_skip(verbose, id, "application bundle");
            return None;
        }

        if !metadata.is_dir() && !metadata.is_file() {
            log_skip(verbose, id, "not a regular file or directory");
            return None;
        }

        if let Err(e) = readable(path, &metadata) {
            log_skip(verbose, id, &format!("unreadable: {}", e));
            return None;
        }

        Some(metadata)
    }
}

/// Opens the entry the way discovery or materialize later will, then
/// releases it
fn readable(path: &Path, metadata: &Metadata) -> std::io::Result<()> {
    if metadata.is_dir() {
        fs::read_dir(path).map(drop)
    } else {
        File::open(path).map(drop)
    }
}

fn is_bundle(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    BUNDLE_SUFFIXES.iter().any(|suffix| lowered.ends_with(suffix))
}

/// Fingerprint of the file or directory at `path`; empty if it cannot be
/// read
pub(crate) fn path_fingerprint(path: &Path) -> String {
    fs::metadata(path).map(|m| fingerprint(&m)).unwrap_or_default()
}

/// `"{mtime_millis}-{len}"`, or empty when the platform has no mtime
fn fingerprint(metadata: &Metadata) -> String {
    metadata
        .modified()
        .ok()
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map(|d| format!("{}-{}", d.as_millis(), metadata.len()))
        .unwrap_or_default()
}

#[async_trait]
impl SourceAdapter for FilesystemAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Filesystem
    }

    async fn discover_children(
        &self,
        entity: &DataEntity,
        _retained: Option<&str>,
        ctx: &CrawlContext,
    ) -> Result<ChildStream> {
        let metadata = tokio::fs::metadata(&entity.source_id)
            .await
            .map_err(|e| CrawlError::io(&entity.source_id, e))?;
        if !metadata.is_dir() {
            return Ok(ChildStream::empty());
        }

        let options = self.options.clone();
        let parent = entity.clone();
        let verbose = ctx.verbose;
        Ok(DiscoveryChannel::spawn(
            entity.source_id.clone(),
            ctx.cancellation.clone(),
            move |tx| Self::list_directory(&options, &parent, verbose, tx),
        ))
    }

    async fn materialize(&self, entity: &DataEntity) -> Result<Materialized> {
        let path = Path::new(&entity.source_id);
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| CrawlError::io(&entity.source_id, e))?;
        if metadata.is_dir() {
            return Ok(Materialized::none());
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| CrawlError::io(&entity.source_id, e))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut attrs = Attributes::new()
            .with("fs.name", name)
            .with("fs.size", metadata.len().to_string());
        if let Ok(modified) = metadata.modified() {
            attrs.insert("fs.modified", DateTime::<Utc>::from(modified).to_rfc3339());
        }

        Ok(Materialized::content(ContentStream::new(file), attrs))
    }
}
