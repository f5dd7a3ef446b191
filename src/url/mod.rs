//! URL handling and source-id filtering for Sumi-Trawl
//!
//! This module provides URL normalization, domain extraction, wildcard
//! matching, and the include/exclude filter applied to every discovered
//! child before it is visited.

mod domain;
mod matcher;
mod normalize;

use crate::{ConfigError, ConfigResult};

pub use domain::{extract_domain, same_origin, source_host};
pub use matcher::{matches_prefix, matches_wildcard};
pub use normalize::{normalize_parsed, normalize_url};

/// One include or exclude entry
#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterPattern {
    /// Applies to any source id, URL or not
    Prefix(String),
    /// Applies to the host of URL source ids only
    Host(String),
}

impl FilterPattern {
    fn parse(raw: &str) -> ConfigResult<Self> {
        let pattern = raw.trim();
        if pattern.is_empty() {
            return Err(ConfigError::InvalidPattern("pattern is empty".to_string()));
        }

        if pattern.contains('/') {
            return Ok(Self::Prefix(pattern.to_string()));
        }

        let wildcard_body = pattern.strip_prefix("*.").unwrap_or(pattern);
        if wildcard_body.is_empty() || wildcard_body.contains('*') {
            return Err(ConfigError::InvalidPattern(format!(
                "'{}': wildcards are only allowed as a leading '*.'",
                pattern
            )));
        }
        Ok(Self::Host(pattern.to_ascii_lowercase()))
    }

    fn matches(&self, source_id: &str, host: Option<&str>) -> bool {
        match self {
            Self::Prefix(prefix) => matches_prefix(prefix, source_id),
            Self::Host(pattern) => host.map_or(false, |h| matches_wildcard(pattern, h)),
        }
    }
}

/// Include/exclude filter over source ids
///
/// Exclusions win over inclusions, and an empty include list admits
/// everything that is not excluded.
///
/// # Examples
///
/// ```
/// use sumi_trawl::url::DomainFilter;
///
/// let filter = DomainFilter::new(
///     &["*.example.com".to_string()],
///     &["private.example.com".to_string()],
/// )
/// .unwrap();
///
/// assert!(filter.admits("https://blog.example.com/post"));
/// assert!(!filter.admits("https://private.example.com/"));
/// assert!(!filter.admits("https://other.org/"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    include: Vec<FilterPattern>,
    exclude: Vec<FilterPattern>,
}

impl DomainFilter {
    /// Builds a filter, rejecting malformed patterns
    pub fn new(include: &[String], exclude: &[String]) -> ConfigResult<Self> {
        Ok(Self {
            include: include.iter().map(|p| FilterPattern::parse(p)).collect::<ConfigResult<_>>()?,
            exclude: exclude.iter().map(|p| FilterPattern::parse(p)).collect::<ConfigResult<_>>()?,
        })
    }

    /// A filter that admits everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Decides whether `source_id` may be visited
    pub fn admits(&self, source_id: &str) -> bool {
        let host = source_host(source_id);
        let host = host.as_deref();

        if self.exclude.iter().any(|p| p.matches(source_id, host)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|p| p.matches(source_id, host))
    }
}
