// ABOUTME: URL sequencing for paginated listings across numbered, templated, and link-driven schemes.
// ABOUTME: Computes the URL of page N from a base URL, or reads it from the previous page's document.

use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CrawlError;
use crate::extractors::rules::SelectorChain;
use crate::extractors::select::extract_next_link;

/// How the page number is attached for `unnumbered-first` listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuffixStyle {
    /// `file-stem` when the base ends in `.html`, `path-segment` otherwise
    #[default]
    Auto,
    /// `https://x/y/` -> `https://x/y/2.html`
    PathSegment,
    /// `https://x/y/list.html` -> `https://x/y/list2.html`
    FileStem,
}

/// The pagination scheme of a crawl. Exactly one is active per crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PageAddress {
    /// Page 1 is the base URL verbatim; later pages add an `N.html` suffix.
    UnnumberedFirst {
        #[serde(default)]
        suffix: SuffixStyle,
    },
    /// Page N adds `key=N` to the query string.
    QueryParam {
        #[serde(default = "default_query_key")]
        key: String,
        /// Leave page 1 without the parameter
        #[serde(default = "default_true")]
        bare_first_page: bool,
    },
    /// Page N+1 is the `next_page` link found on page N.
    LinkFollow,
    /// The page number replaces a placeholder in the base URL.
    Templated {
        #[serde(default = "default_placeholder")]
        placeholder: String,
    },
}

fn default_query_key() -> String {
    "p".to_string()
}

fn default_true() -> bool {
    true
}

fn default_placeholder() -> String {
    "{}".to_string()
}

impl Default for PageAddress {
    fn default() -> Self {
        PageAddress::UnnumberedFirst {
            suffix: SuffixStyle::Auto,
        }
    }
}

impl PageAddress {
    pub fn unnumbered_first(suffix: SuffixStyle) -> Self {
        PageAddress::UnnumberedFirst { suffix }
    }

    pub fn query_param(key: impl Into<String>) -> Self {
        PageAddress::QueryParam {
            key: key.into(),
            bare_first_page: true,
        }
    }

    pub fn templated(placeholder: impl Into<String>) -> Self {
        PageAddress::Templated {
            placeholder: placeholder.into(),
        }
    }

    pub fn is_link_follow(&self) -> bool {
        matches!(self, PageAddress::LinkFollow)
    }

    /// Checks that the scheme can produce URLs for `base` before anything is fetched.
    pub fn validate(&self, base: &str) -> Result<(), CrawlError> {
        match self {
            PageAddress::Templated { placeholder } => {
                if placeholder.is_empty() || !base.contains(placeholder.as_str()) {
                    return Err(CrawlError::scheme(
                        base,
                        "Validate",
                        Some(anyhow::anyhow!(
                            "templated base URL has no `{}` placeholder",
                            placeholder
                        )),
                    ));
                }
            }
            PageAddress::UnnumberedFirst {
                suffix: SuffixStyle::FileStem,
            } if !base.ends_with(".html") => {
                return Err(CrawlError::scheme(
                    base,
                    "Validate",
                    Some(anyhow::anyhow!("file-stem suffix needs a base ending in .html")),
                ));
            }
            PageAddress::QueryParam { key, .. } if key.trim().is_empty() => {
                return Err(CrawlError::scheme(
                    base,
                    "Validate",
                    Some(anyhow::anyhow!("query parameter key is empty")),
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

/// The previously fetched page, needed by link-driven pagination.
#[derive(Debug, Clone, Copy)]
pub struct PreviousPage<'a> {
    pub url: &'a Url,
    pub document: &'a Html,
    pub next_page: &'a SelectorChain,
}

/// Computes the URL of `page`.
///
/// Numbered schemes never touch page 1 unless told to; link-follow needs the
/// previous page and fails with `NoNextLink` when it has no next link, which
/// callers treat as end of data.
pub fn resolve(
    base: &str,
    page: u32,
    scheme: &PageAddress,
    previous: Option<&PreviousPage<'_>>,
) -> Result<String, CrawlError> {
    if page == 0 {
        return Err(CrawlError::scheme(
            base,
            "Resolve",
            Some(anyhow::anyhow!("pages are numbered from 1")),
        ));
    }

    match scheme {
        PageAddress::UnnumberedFirst { .. } | PageAddress::LinkFollow if page == 1 => {
            Ok(base.to_string())
        }
        PageAddress::UnnumberedFirst { suffix } => numbered_suffix(base, page, *suffix),
        PageAddress::QueryParam {
            key,
            bare_first_page,
        } => {
            if page == 1 && *bare_first_page {
                Ok(base.to_string())
            } else {
                Ok(with_query_param(base, key, page))
            }
        }
        PageAddress::LinkFollow => {
            let prev = previous.ok_or_else(|| {
                CrawlError::scheme(
                    base,
                    "Resolve",
                    Some(anyhow::anyhow!("link-follow needs the previous page")),
                )
                .with_page(page)
            })?;
            extract_next_link(prev.document, prev.next_page, prev.url)
                .ok_or_else(|| CrawlError::no_next_link(prev.url.as_str(), "Resolve").with_page(page))
        }
        PageAddress::Templated { placeholder } => {
            if placeholder.is_empty() || !base.contains(placeholder.as_str()) {
                return Err(CrawlError::scheme(
                    base,
                    "Resolve",
                    Some(anyhow::anyhow!("no `{}` placeholder in base URL", placeholder)),
                )
                .with_page(page));
            }
            Ok(base.replace(placeholder.as_str(), &page.to_string()))
        }
    }
}

fn numbered_suffix(base: &str, page: u32, suffix: SuffixStyle) -> Result<String, CrawlError> {
    let file_stem = match suffix {
        SuffixStyle::Auto => base.ends_with(".html"),
        SuffixStyle::PathSegment => false,
        SuffixStyle::FileStem => true,
    };

    if file_stem {
        let stem = base.strip_suffix(".html").ok_or_else(|| {
            CrawlError::scheme(
                base,
                "Resolve",
                Some(anyhow::anyhow!("file-stem suffix needs a base ending in .html")),
            )
            .with_page(page)
        })?;
        return Ok(format!("{}{}.html", stem, page));
    }

    let trimmed = base.strip_suffix('/').unwrap_or(base);
    Ok(format!("{}/{}.html", trimmed, page))
}

/// Sets `key=page` in the query, replacing an existing value and keeping any fragment last.
fn with_query_param(base: &str, key: &str, page: u32) -> String {
    let (head, fragment) = match base.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (base, None),
    };
    let pair = format!("{}={}", key, page);

    let mut out = match head.split_once('?') {
        Some((path, query)) => {
            let mut replaced = false;
            let mut pairs: Vec<String> = query
                .split('&')
                .filter(|p| !p.is_empty())
                .map(|p| {
                    let name = p.split('=').next().unwrap_or(p);
                    if name == key && !replaced {
                        replaced = true;
                        pair.clone()
                    } else {
                        p.to_string()
                    }
                })
                .collect();
            if !replaced {
                pairs.push(pair);
            }
            format!("{}?{}", path, pairs.join("&"))
        }
        None => format!("{}?{}", head, pair),
    };

    if let Some(frag) = fragment {
        out.push('#');
        out.push_str(frag);
    }
    out
}
