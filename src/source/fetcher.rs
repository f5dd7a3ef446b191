//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the hyperlink and feed
//! adapters, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests following a bounded redirect chain
//! - Error classification into transient and permanent failures

use crate::config::{HyperlinkConfig, UserAgentConfig};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

const MAX_REDIRECTS: usize = 10;

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    pub status: u16,
    /// Content-Type header value, empty when absent
    pub content_type: String,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        ct.contains("text/html") || ct.contains("application/xhtml")
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The MIME type without parameters
    pub fn mime_type(&self) -> &str {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
    }
}

/// Retrieves remote resources for the hyperlink and feed adapters
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, mapping failures onto crawl errors
    ///
    /// 5xx and 429 responses are `TransientIo`; any other non-success
    /// status is `PermanentFormat`. Connection failures are `Http`.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use sumi_trawl::config::{HyperlinkConfig, UserAgentConfig};
/// use sumi_trawl::source::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiTrawl".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, &HyperlinkConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    hyperlink: &HyperlinkConfig,
) -> std::result::Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(hyperlink.request_timeout))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] over a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &UserAgentConfig, hyperlink: &HyperlinkConfig) -> Result<Self> {
        let client = build_http_client(config, hyperlink).map_err(|e| CrawlError::Http {
            url: String::new(),
            source: e,
        })?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        classify_status(url, status)?;

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| CrawlError::Http {
                url: url.to_string(),
                source: e,
            })?
            .to_vec();

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Maps a response status onto the crawl error taxonomy
fn classify_status(url: &str, status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(CrawlError::io(
            url,
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP {} (retry later)", status.as_u16()),
            ),
        ));
    }

    Err(CrawlError::format(url, format!("HTTP {}", status.as_u16())))
}
