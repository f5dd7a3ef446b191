//! Configuration module for Sumi-Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! println!("Crawler max depth: {:?}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, FilesystemConfig, FilterConfig, HyperlinkConfig, OutputConfig,
    SinkMode, SourceEntry, TrackerConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

use crate::url::DomainFilter;
use crate::ConfigResult;

impl Config {
    /// Builds the shared domain filter from the `[filter]` section
    pub fn domain_filter(&self) -> ConfigResult<DomainFilter> {
        DomainFilter::new(&self.filter.include, &self.filter.exclude)
    }
}
