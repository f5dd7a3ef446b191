use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_trawl::url::extract_domain;
///
/// let url = Url::parse("https://Sub.EXAMPLE.com:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Host of a source id, if the id is an absolute URL with a host
pub fn source_host(source_id: &str) -> Option<String> {
    Url::parse(source_id).ok().as_ref().and_then(extract_domain)
}

/// Returns true if both URLs share scheme, host and effective port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && extract_domain(a) == extract_domain(b)
        && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain(&url("https://api.v2.example.com/endpoint?q=1#x")),
            Some("api.v2.example.com".to_string())
        );
        assert_eq!(extract_domain(&url("file:///tmp/a.txt")), None);
    }

    #[test]
    fn test_source_host() {
        assert_eq!(
            source_host("https://Example.com/a"),
            Some("example.com".to_string())
        );
        assert_eq!(source_host("/var/mail/inbox"), None);
        assert_eq!(source_host("file:///tmp/a.txt"), None);
    }

    #[test]
    fn test_same_origin() {
        let base = url("https://example.com/a");
        assert!(same_origin(&base, &url("https://example.com:443/b")));
        assert!(same_origin(&base, &url("https://EXAMPLE.com/c?d")));
        assert!(!same_origin(&base, &url("http://example.com/a")));
        assert!(!same_origin(&base, &url("https://blog.example.com/a")));
        assert!(!same_origin(&base, &url("https://example.com:8443/a")));
    }
}
