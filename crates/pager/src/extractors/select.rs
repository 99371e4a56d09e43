// ABOUTME: Selector-based value extraction scoped to an item root or a whole document.
// ABOUTME: Evaluates fallback chains lazily, first non-empty candidate wins, with link resolution.

//! Selector-based field extraction utilities.
//!
//! Key behaviors:
//! - Candidates are tried in order; the first yielding a non-empty value wins
//!   and later candidates are never evaluated.
//! - Text extraction joins the node's text and normalizes whitespace.
//! - Attribute extraction returns the attribute value trimmed.
//! - Link values are resolved against the URL of the page they were found on.

use scraper::{ElementRef, Html};
use url::Url;

use crate::extractors::compiled::get_or_compile;
use crate::extractors::rules::{is_self_selector, parse_selector, FieldRule, SelectorChain, SelectorSpec};

/// Normalizes whitespace in a string by collapsing runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the first non-empty value produced by `attempt`, evaluating candidates in order.
///
/// Evaluation stops at the first hit, so a candidate after the winning one is never evaluated.
pub fn first_non_empty<'a, T, F>(candidates: &'a [T], mut attempt: F) -> Option<String>
where
    F: FnMut(&'a T) -> Option<String>,
{
    candidates
        .iter()
        .find_map(|candidate| attempt(candidate).filter(|value| !value.is_empty()))
}

/// Selects item roots using the first candidate that matches at least one element.
pub fn select_roots<'a>(doc: &'a Html, chain: &SelectorChain) -> Vec<ElementRef<'a>> {
    for spec in chain.candidates() {
        let (css, _) = parse_selector(spec);
        let Some(selector) = get_or_compile(css) else {
            continue;
        };
        let roots: Vec<ElementRef<'a>> = doc.select(&selector).collect();
        if !roots.is_empty() {
            return roots;
        }
    }
    Vec::new()
}

/// Reads the text or attribute value of a single element.
fn element_value(el: &ElementRef<'_>, attr: Option<&str>) -> Option<String> {
    let value = match attr {
        Some(attr) => el.value().attr(attr)?.trim().to_string(),
        None => normalize_whitespace(&el.text().collect::<String>()),
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Extracts the first non-empty value for one candidate, scoped to `root`.
///
/// A self selector (`""` or `"&"`) reads the root itself; otherwise descendants
/// matching the CSS are tried in document order.
pub fn extract_from_root(
    root: &ElementRef<'_>,
    spec: &SelectorSpec,
    default_attr: Option<&str>,
) -> Option<String> {
    let (css, own_attr) = parse_selector(spec);
    let attr = own_attr.or(default_attr);

    if is_self_selector(css) {
        return element_value(root, attr);
    }

    let selector = get_or_compile(css)?;
    root.select(&selector)
        .find_map(|el| element_value(&el, attr))
}

/// Applies a field's fallback chain against `root`.
///
/// Link fields are joined with `page_url`; a value that cannot be joined counts
/// as a miss and the next candidate is tried. Truncation applies last.
pub fn extract_field(
    root: &ElementRef<'_>,
    name: &str,
    rule: &FieldRule,
    page_url: &Url,
) -> Option<String> {
    let is_link = rule.is_link(name);
    let default_attr = rule.default_attr(name);

    let value = first_non_empty(rule.selectors.candidates(), |spec| {
        let raw = extract_from_root(root, spec, default_attr)?;
        if is_link {
            page_url.join(&raw).ok().map(String::from)
        } else {
            Some(raw)
        }
    })?;

    Some(match rule.max_chars {
        Some(max) => truncate_chars(&value, max),
        None => value,
    })
}

/// Resolves the next-page link of a document to an absolute URL.
pub fn extract_next_link(doc: &Html, chain: &SelectorChain, page_url: &Url) -> Option<String> {
    let rule = FieldRule {
        selectors: chain.clone(),
        link: Some(true),
        ..Default::default()
    };
    extract_field(&doc.root_element(), "next_page", &rule, page_url)
}

/// Truncates to at most `max` characters, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
