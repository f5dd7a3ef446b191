/// Checks if a host matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches the bare domain and any
///    subdomain at any nesting level
///
/// Matching is ASCII case-insensitive.
///
/// # Examples
///
/// ```
/// use sumi_trawl::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "Example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Checks if a source id starts with a prefix pattern
///
/// A trailing `*` on the pattern is accepted and ignored, so `/data/*`
/// and `/data/` are equivalent.
pub fn matches_prefix(pattern: &str, source_id: &str) -> bool {
    let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
    source_id.starts_with(prefix)
}
