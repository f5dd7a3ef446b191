use crate::state::SourceKind;
use serde::Deserialize;

/// Main configuration structure for Sumi-Trawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub hyperlink: HyperlinkConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    pub output: OutputConfig,
    /// Top-level crawl roots, each crawled independently
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Traversal behavior configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum depth below each root; unbounded when absent
    pub max_depth: Option<u32>,

    /// Abort the whole crawl on the first failing entity
    #[serde(default)]
    pub interrupt_on_error: bool,

    /// Log filter and admissibility skips at info level
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub sink_mode: SinkMode,
}

/// Lifetime of the content sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkMode {
    /// One sink for the whole crawl
    #[default]
    Shared,
    /// A fresh sink for every entity
    PerEntity,
}

/// Include/exclude patterns applied to every discovered child
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Filesystem adapter options
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FilesystemConfig {
    #[serde(default)]
    pub follow_symlinks: bool,

    #[serde(default = "default_true")]
    pub ignore_hidden: bool,

    /// Treat `.app`, `.bundle` and `.framework` directories as opaque
    #[serde(default = "default_true")]
    pub skip_bundles: bool,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_hidden: true,
            skip_bundles: true,
        }
    }
}

/// Hyperlink and feed adapter options
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HyperlinkConfig {
    /// Follow links to other origins than the linking page
    #[serde(default)]
    pub allow_cross_origin: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for HyperlinkConfig {
    fn default() -> Self {
        Self {
            allow_cross_origin: false,
            request_timeout: default_request_timeout(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    pub crawler_name: String,
    pub crawler_version: String,
    /// URL with information about the crawler
    pub contact_url: String,
    pub contact_email: String,
}

/// Change tracker persistence
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackerConfig {
    /// SQLite file for fingerprints; defaults to the output database
    pub database_path: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database receiving entity records
    pub database_path: String,

    /// Path to the markdown summary file
    pub summary_path: String,
}

/// One crawl root
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Source kind name, e.g. `filesystem` or `flat-list`
    pub kind: String,
    /// Path or URL of the root entity
    pub location: String,
}

impl SourceEntry {
    pub fn source_kind(&self) -> Option<SourceKind> {
        SourceKind::from_str_opt(&self.kind)
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}
