// ABOUTME: Page structure preview: counts how many elements each candidate item selector matches.
// ABOUTME: Helps users pick a working `item` rule before running a full crawl.

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::error::CrawlError;
use crate::extractors::compiled::precompile_selectors;
use crate::extractors::rules::{parse_selector, SelectorChain};
use crate::extractors::select::{select_roots, truncate_chars};
use crate::resource::FetchResult;

/// Characters of outer HTML kept for a candidate's first match.
pub const SAMPLE_CHARS: usize = 500;

/// Item selectors tried when the caller gives none.
pub const DEFAULT_CANDIDATES: &[&str] = &["div.spot-item", "li.spot-list-item", "div.item", "article"];

/// How one candidate selector fared against the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub selector: String,
    pub count: usize,
    /// Outer HTML of the first match, cut to `SAMPLE_CHARS` with a trailing `...`
    pub sample: Option<String>,
}

/// Structure report for one fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePreview {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub encoding: String,
    pub candidates: Vec<CandidateMatch>,
}

impl PagePreview {
    /// The first candidate, in the order given, that matched anything.
    pub fn best(&self) -> Option<&CandidateMatch> {
        self.candidates.iter().find(|c| c.count > 0)
    }
}

/// Rejects candidate lists that are empty or contain invalid CSS.
pub fn validate_candidates(candidates: &SelectorChain) -> Result<(), CrawlError> {
    if candidates.is_empty() {
        return Err(CrawlError::config(
            "Preview",
            anyhow::anyhow!("at least one candidate selector is required"),
        ));
    }
    let invalid = precompile_selectors(candidates.css_strings());
    if !invalid.is_empty() {
        return Err(CrawlError::config(
            "Preview",
            anyhow::anyhow!("invalid CSS selector(s): {}", invalid.join(", ")),
        ));
    }
    Ok(())
}

/// Evaluates every candidate independently against a parsed document.
pub fn preview_document(doc: &Html, candidates: &SelectorChain) -> Vec<CandidateMatch> {
    candidates
        .candidates()
        .iter()
        .map(|spec| {
            let (css, _) = parse_selector(spec);
            let roots = select_roots(doc, &SelectorChain::from(css));
            CandidateMatch {
                selector: css.to_string(),
                count: roots.len(),
                sample: roots.first().map(|el| sample_html(&el.html())),
            }
        })
        .collect()
}

/// Decodes and parses a fetched page, then previews it.
pub fn preview_fetched(fetched: &FetchResult, candidates: &SelectorChain) -> PagePreview {
    let (text, encoding) = fetched.decode();
    let doc = Html::parse_document(&text);
    PagePreview {
        url: fetched.url.clone(),
        final_url: fetched.final_url.clone(),
        status: fetched.status,
        encoding: encoding.to_string(),
        candidates: preview_document(&doc, candidates),
    }
}

fn sample_html(html: &str) -> String {
    if html.chars().count() > SAMPLE_CHARS {
        format!("{}...", truncate_chars(html, SAMPLE_CHARS))
    } else {
        html.to_string()
    }
}
