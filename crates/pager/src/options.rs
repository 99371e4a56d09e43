// ABOUTME: HTTP-level options for the crawler and the CrawlerBuilder fluent API.
// ABOUTME: Covers the user agent, extra request headers, and an optional pre-built reqwest client.

use std::collections::HashMap;

use crate::crawler::Crawler;
use crate::error::CrawlError;

/// A desktop browser identification string; some listing sites refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Configuration options shared by every crawl a `Crawler` runs.
#[derive(Debug, Clone)]
pub struct Options {
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    pub http_client: Option<reqwest::Client>,
}

impl Default for Options {
    fn default() -> Self {
        let mut headers = HashMap::new();
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        );
        headers.insert(
            "Accept-Language".to_string(),
            "ja,en-US;q=0.9,en;q=0.8".to_string(),
        );
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers,
            http_client: None,
        }
    }
}

/// Builder for constructing Crawler instances with custom configuration.
#[derive(Debug, Clone)]
pub struct CrawlerBuilder {
    opts: Options,
}

impl CrawlerBuilder {
    /// Create a new CrawlerBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Add or replace a header sent with every request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Use a custom HTTP client. Its own user agent and defaults take precedence.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Build the Crawler with the configured options.
    pub fn build(self) -> Result<Crawler, CrawlError> {
        Crawler::new(self.opts)
    }
}

impl Default for CrawlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
