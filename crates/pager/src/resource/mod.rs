// ABOUTME: Resource handling module for fetching listing pages over HTTP.
// ABOUTME: Handles per-request timeouts, status classification, content-length limits, and charset decoding.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use encoding_rs::{Encoding, EUC_JP, SHIFT_JIS, UTF_8};
use tracing::debug;

use crate::error::CrawlError;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Options for fetching a resource.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body to text, returning the text and the name of the encoding used.
    pub fn decode(&self) -> (String, &'static str) {
        decode_body(&self.body)
    }
}

/// Byte encodings tried, in order, after the detector's guess.
fn fallback_encodings() -> [&'static Encoding; 3] {
    [UTF_8, SHIFT_JIS, EUC_JP]
}

/// Decode body bytes to a String.
///
/// The detector's best guess is tried first, then UTF-8, Shift_JIS and EUC-JP;
/// the first that decodes without malformed sequences wins. If none does the
/// body is decoded as UTF-8 with replacement characters.
pub fn decode_body(body: &[u8]) -> (String, &'static str) {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let guess = detector.guess(None, true);

    let mut candidates = vec![guess];
    candidates.extend(fallback_encodings());
    decode_first_valid(body, &candidates)
}

/// Decodes with the first candidate that yields no malformed sequences.
pub fn decode_first_valid(body: &[u8], candidates: &[&'static Encoding]) -> (String, &'static str) {
    for encoding in candidates {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) {
            return (strip_bom(text), encoding.name());
        }
    }
    (String::from_utf8_lossy(body).into_owned(), UTF_8.name())
}

fn strip_bom(text: Cow<'_, str>) -> String {
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text.into_owned(),
    }
}

/// Fetch a resource from the given URL.
///
/// Non-2xx statuses come back as `Http` errors so callers can treat them as a
/// soft end-of-data signal; connection failures are `Network`, and expired
/// deadlines are `Timeout`.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, CrawlError> {
    let parsed_url = url::Url::parse(url).map_err(|e| {
        CrawlError::scheme(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    let scheme = parsed_url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(CrawlError::scheme(
            url,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    let mut request = client.get(parsed_url).timeout(opts.timeout);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| classify_transport_error(url, "request failed", e))?;

    let content_length = response.content_length().or_else(|| {
        response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    });
    if let Some(len) = content_length {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(CrawlError::network(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    if !response.status().is_success() {
        return Err(CrawlError::http(url, "Fetch", status));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| classify_transport_error(url, "failed to read body", e))?;

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(CrawlError::network(
            url,
            "Fetch",
            Some(anyhow::anyhow!("content too large")),
        ));
    }

    debug!(url, status, bytes = body.len(), "fetched");

    Ok(FetchResult {
        status,
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}

fn classify_transport_error(url: &str, what: &str, e: reqwest::Error) -> CrawlError {
    let source = Some(anyhow::anyhow!("{}: {}", what, e));
    if e.is_timeout() {
        CrawlError::timeout(url, "Fetch", source)
    } else {
        CrawlError::network(url, "Fetch", source)
    }
}
