// ABOUTME: Pre-compiled CSS selector cache for O(1) selector lookup.
// ABOUTME: Eliminates repeated parsing of the same rule selectors on every page and item.

//! Selector caching for efficient repeated DOM queries.
//!
//! A crawl evaluates the same handful of selectors against every item root on
//! every page. Selectors are compiled once and shared process-wide.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::Selector;

/// Thread-safe cache of compiled CSS selectors; invalid selectors are cached as `None`.
static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns `Some(Selector)` if the selector is valid, `None` if invalid.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = Selector::parse(css).ok();
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    // Another thread may have inserted while we compiled
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

/// Compiles a batch of selectors into the cache and returns the ones that failed.
pub fn precompile_selectors<I, S>(selectors: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut invalid = Vec::new();
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    for css in selectors {
        let css = css.as_ref();
        let entry = cache
            .entry(css.to_string())
            .or_insert_with(|| Selector::parse(css).ok());
        if entry.is_none() {
            invalid.push(css.to_string());
        }
    }
    invalid
}

/// Whether `css` has been compiled into the cache.
#[cfg(test)]
pub(crate) fn is_cached(css: &str) -> bool {
    SELECTOR_CACHE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .contains_key(css)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_selector_is_cached() {
        assert!(get_or_compile("div.container").is_some());
        assert!(get_or_compile("div.container").is_some());
    }

    #[test]
    fn test_invalid_selector_returns_none() {
        assert!(get_or_compile("[[[invalid").is_none());
        // Invalid selectors are also cached (as None)
        assert!(get_or_compile("[[[invalid").is_none());
    }

    #[test]
    fn test_precompile_reports_invalid() {
        let invalid = precompile_selectors(["h1", "p.intro", "div[[[", "li > a"]);
        assert_eq!(invalid, vec!["div[[[".to_string()]);
        assert!(get_or_compile("li > a").is_some());
    }
}
