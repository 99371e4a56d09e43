// ABOUTME: Error types for the pager crawl engine including ErrorCode enum and CrawlError struct.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;

/// Error codes representing different categories of crawl failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Config,
    Network,
    Timeout,
    Http,
    Extract,
    Scheme,
    NoNextLink,
    Cancelled,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Config => "invalid configuration",
            ErrorCode::Network => "network error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Http => "HTTP error",
            ErrorCode::Extract => "extraction error",
            ErrorCode::Scheme => "pagination scheme error",
            ErrorCode::NoNextLink => "no next page link",
            ErrorCode::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for crawl operations.
#[derive(Debug, thiserror::Error)]
pub struct CrawlError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    pub page: Option<u32>,
    pub status: Option<u16>,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pager: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(page) = self.page {
            write!(f, " (page {})", page)?;
        }
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl CrawlError {
    fn new(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            page: None,
            status: None,
            source,
        }
    }

    /// Create a Config error. Config errors never carry a URL that was fetched.
    pub fn config(op: impl Into<String>, source: anyhow::Error) -> Self {
        Self::new(ErrorCode::Config, String::new(), op, Some(source))
    }

    /// Create a Network error.
    pub fn network(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Network, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Timeout, url, op, source)
    }

    /// Create an Http error for a non-2xx response.
    pub fn http(url: impl Into<String>, op: impl Into<String>, status: u16) -> Self {
        let mut err = Self::new(
            ErrorCode::Http,
            url,
            op,
            Some(anyhow::anyhow!("HTTP status {}", status)),
        );
        err.status = Some(status);
        err
    }

    /// Create an Extract error.
    pub fn extract(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Extract, url, op, source)
    }

    /// Create a Scheme error.
    pub fn scheme(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Scheme, url, op, source)
    }

    /// Create a NoNextLink error.
    pub fn no_next_link(url: impl Into<String>, op: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoNextLink, url, op, None)
    }

    /// Create a Cancelled error.
    pub fn cancelled(url: impl Into<String>, op: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, url, op, None)
    }

    /// Attach the page number the error occurred on.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Returns true if this is a Config error.
    pub fn is_config(&self) -> bool {
        self.code == ErrorCode::Config
    }

    /// Returns true if this is a Network error.
    pub fn is_network(&self) -> bool {
        self.code == ErrorCode::Network
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is an Http error.
    pub fn is_http(&self) -> bool {
        self.code == ErrorCode::Http
    }

    /// Returns true if this is an Extract error.
    pub fn is_extract(&self) -> bool {
        self.code == ErrorCode::Extract
    }

    /// Returns true if this is a Scheme error.
    pub fn is_scheme(&self) -> bool {
        self.code == ErrorCode::Scheme
    }

    /// Returns true if this is a NoNextLink error.
    pub fn is_no_next_link(&self) -> bool {
        self.code == ErrorCode::NoNextLink
    }

    /// Returns true if this is a Cancelled error.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Returns true for failures that end the crawl as an operational error.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self.code, ErrorCode::Network | ErrorCode::Timeout)
    }

    /// Returns true for signals that mean "no more data" rather than failure.
    pub fn is_soft(&self) -> bool {
        matches!(self.code, ErrorCode::Http | ErrorCode::NoNextLink)
    }
}
