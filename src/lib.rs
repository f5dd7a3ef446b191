//! Sumi-Trawl: a recursive data-source crawler
//!
//! This crate walks nested data sources (filesystem trees, maildir mailboxes,
//! hyperlinked pages, feeds and flat URL lists) and streams every reachable
//! data entity, with its content and metadata, into a content sink.

pub mod config;
pub mod crawler;
pub mod output;
pub mod source;
pub mod state;
pub mod tracker;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Trawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Underlying adapter I/O failure (disk, network)
    #[error("I/O error for {source_id}: {source}")]
    TransientIo {
        source_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    /// The adapter cannot produce content for this entity at all
    #[error("Cannot materialize {source_id}: {message}")]
    PermanentFormat { source_id: String, message: String },

    /// Raised only when `interrupt_on_error` is set and an entity failed
    #[error("Crawl aborted at {source_id}: {cause}")]
    Aborted {
        source_id: String,
        #[source]
        cause: Box<CrawlError>,
    },

    #[error("No adapter registered for source kind '{0}'")]
    NoAdapter(state::SourceKind),

    #[error("Change tracker error: {0}")]
    Tracker(#[from] tracker::TrackerError),

    #[error("Content sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Wraps an I/O failure with the id of the entity that caused it
    pub fn io(source_id: impl Into<String>, source: std::io::Error) -> Self {
        Self::TransientIo {
            source_id: source_id.into(),
            source,
        }
    }

    /// Builds a permanent format error for an entity
    pub fn format(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PermanentFormat {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Returns true if this is a crawl-wide abort
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Trawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CancellationToken, CrawlContext, CrawlEngine, CrawlReport};
pub use state::{Attributes, DataEntity, ModificationState, SourceKind};
pub use url::{extract_domain, normalize_url, DomainFilter};
