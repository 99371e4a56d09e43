// ABOUTME: Per-crawl configuration: base URL, pagination scheme, rules, limits, delays, and auto-stop.
// ABOUTME: Loads from JSON and validates everything before any network call is made.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::CrawlError;
use crate::extractors::compiled::precompile_selectors;
use crate::extractors::rules::{SelectorRules, RESERVED_FIELDS};
use crate::pagination::{DelayRange, PageAddress};

/// Auto-stop policy: end the crawl when a page yields fewer records than `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AutoStop {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

fn default_threshold() -> usize {
    1
}

impl Default for AutoStop {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_threshold(),
        }
    }
}

impl AutoStop {
    pub fn enabled(threshold: usize) -> Self {
        Self {
            enabled: true,
            threshold,
        }
    }
}

/// Everything one crawl needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    pub base_url: String,
    #[serde(default)]
    pub scheme: PageAddress,
    pub rules: SelectorRules,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    #[serde(default = "default_page_delay")]
    pub page_delay: DelayRange,
    #[serde(default)]
    pub item_delay: DelayRange,
    #[serde(default)]
    pub auto_stop: AutoStop,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    #[serde(default)]
    pub max_items_per_page: Option<usize>,
    #[serde(default = "default_unknown")]
    pub unknown_value: String,
}

fn default_max_pages() -> u32 {
    5
}

fn default_start_page() -> u32 {
    1
}

fn default_page_delay() -> DelayRange {
    DelayRange::new(1.0, 3.0)
}

fn default_timeout_secs() -> f64 {
    10.0
}

/// Longest per-request timeout accepted, in seconds.
pub const MAX_TIMEOUT_SECS: f64 = 600.0;

fn default_unknown() -> String {
    "unknown".to_string()
}

impl CrawlConfig {
    /// Creates a config with default limits and delays.
    pub fn new(base_url: impl Into<String>, scheme: PageAddress, rules: SelectorRules) -> Self {
        Self {
            base_url: base_url.into(),
            scheme,
            rules,
            max_pages: default_max_pages(),
            start_page: default_start_page(),
            page_delay: default_page_delay(),
            item_delay: DelayRange::ZERO,
            auto_stop: AutoStop::default(),
            timeout_secs: default_timeout_secs(),
            max_items_per_page: None,
            unknown_value: default_unknown(),
        }
    }

    /// Parses a config from JSON. The result is not yet validated.
    pub fn from_json(json: &str) -> Result<Self, CrawlError> {
        serde_json::from_str(json)
            .map_err(|e| CrawlError::config("Load", anyhow::anyhow!("invalid config JSON: {}", e)))
    }

    /// Reads and parses a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CrawlError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            CrawlError::config(
                "Load",
                anyhow::anyhow!("failed to read {}: {}", path.display(), e),
            )
        })?;
        Self::from_json(&json)
    }

    /// Last page number the crawl may process.
    pub fn last_page(&self) -> u32 {
        self.start_page.saturating_add(self.max_pages.saturating_sub(1))
    }

    pub fn timeout(&self) -> Duration {
        let secs = if self.timeout_secs.is_nan() {
            default_timeout_secs()
        } else {
            self.timeout_secs.clamp(0.0, MAX_TIMEOUT_SECS)
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs(10))
    }

    /// Rejects invalid configuration. Scheme problems surface as `Scheme` errors,
    /// everything else as `Config`.
    pub fn validate(&self) -> Result<(), CrawlError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(invalid("base_url is required"));
        }

        self.scheme.validate(base)?;

        let first_page = match &self.scheme {
            PageAddress::Templated { placeholder } => base.replace(placeholder.as_str(), "1"),
            _ => base.to_string(),
        };
        let parsed = url::Url::parse(&first_page)
            .map_err(|e| invalid(format!("base_url is not a valid URL: {}", e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(invalid("base_url must be http or https"));
        }

        if self.max_pages == 0 {
            return Err(invalid("max_pages must be >= 1"));
        }
        if self.start_page == 0 {
            return Err(invalid("start_page must be >= 1"));
        }
        if self.scheme.is_link_follow() && self.start_page != 1 {
            return Err(invalid("link-follow crawls always start at page 1"));
        }

        self.page_delay.validate("page_delay")?;
        self.item_delay.validate("item_delay")?;

        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(invalid("timeout_secs must be > 0"));
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(invalid(format!(
                "timeout_secs must be <= {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if self.auto_stop.enabled && self.auto_stop.threshold == 0 {
            return Err(invalid("auto_stop threshold must be >= 1"));
        }
        if self.max_items_per_page == Some(0) {
            return Err(invalid("max_items_per_page must be >= 1"));
        }

        self.validate_rules()
    }

    fn validate_rules(&self) -> Result<(), CrawlError> {
        let rules = &self.rules;
        if rules.item.is_empty() || rules.item.css_strings().next().is_none() {
            return Err(invalid("rules.item needs at least one selector"));
        }
        if self.scheme.is_link_follow()
            && rules.next_page.as_ref().map_or(true, |c| c.is_empty())
        {
            return Err(invalid("link-follow pagination requires rules.next_page"));
        }
        for name in RESERVED_FIELDS {
            if rules.fields.contains_key(*name) {
                return Err(invalid(format!("`{}` cannot be used as a field name", name)));
            }
        }
        for (name, rule) in &rules.fields {
            if rule.selectors.is_empty() {
                return Err(invalid(format!("field `{}` has no selectors", name)));
            }
        }

        let invalid_css = precompile_selectors(rules.all_css());
        if !invalid_css.is_empty() {
            return Err(invalid(format!(
                "invalid CSS selector(s): {}",
                invalid_css.join(", ")
            )));
        }
        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> CrawlError {
    CrawlError::config("Validate", anyhow::anyhow!("{}", msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::rules::FieldRule;

    fn config() -> CrawlConfig {
        CrawlConfig::new(
            "https://example.com/list/",
            PageAddress::default(),
            SelectorRules::new("li.item").field("title", FieldRule::css("h3")),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.last_page(), 5);
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_last_page_honours_start_page() {
        let mut cfg = config();
        cfg.start_page = 3;
        cfg.max_pages = 4;
        assert_eq!(cfg.last_page(), 6);
    }

    #[test]
    fn test_rejects_bad_limits() {
        let mut cfg = config();
        cfg.max_pages = 0;
        assert!(cfg.validate().unwrap_err().is_config());

        let mut cfg = config();
        cfg.timeout_secs = 0.0;
        assert!(cfg.validate().unwrap_err().is_config());

        let mut cfg = config();
        cfg.auto_stop = AutoStop::enabled(0);
        assert!(cfg.validate().unwrap_err().is_config());

        let mut cfg = config();
        cfg.page_delay = DelayRange::new(5.0, 1.0);
        assert!(cfg.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_rejects_oversized_durations() {
        let mut cfg = config();
        cfg.timeout_secs = 1e20;
        assert!(cfg.validate().unwrap_err().is_config());
        assert_eq!(cfg.timeout(), Duration::from_secs(600));

        let mut cfg = config();
        cfg.page_delay = DelayRange::new(1e20, 1e20);
        assert!(cfg.validate().unwrap_err().is_config());

        let mut cfg = config();
        cfg.item_delay = DelayRange::new(0.0, 1e20);
        assert!(cfg.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let mut cfg = config();
        cfg.base_url = "  ".to_string();
        assert!(cfg.validate().is_err());

        cfg.base_url = "ftp://example.com/".to_string();
        assert!(cfg.validate().is_err());

        cfg.base_url = "not a url".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_templated_needs_placeholder() {
        let mut cfg = config();
        cfg.scheme = PageAddress::templated("{page}");
        assert!(cfg.validate().unwrap_err().is_scheme());

        cfg.base_url = "https://example.com/list?page={page}".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_link_follow_requirements() {
        let mut cfg = config();
        cfg.scheme = PageAddress::LinkFollow;
        assert!(cfg.validate().unwrap_err().is_config());

        cfg.rules = cfg.rules.clone().next_page("a.next");
        assert!(cfg.validate().is_ok());

        cfg.start_page = 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_selector() {
        let mut cfg = config();
        cfg.rules = cfg.rules.clone().field("price", FieldRule::chain(["span.price", "div[[["]));
        let err = cfg.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("div[[["));
    }

    #[test]
    fn test_rejects_reserved_field_names() {
        let mut cfg = config();
        cfg.rules.fields.insert("item".to_string(), FieldRule::css("li"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "base_url": "https://example.com/events/",
            "scheme": {"type": "query-param", "key": "page"},
            "rules": {"item": "div.event", "title": ["h2", "h3"], "link": "a"},
            "max_pages": 3,
            "page_delay": [0.5, 1.5],
            "auto_stop": {"enabled": true, "threshold": 5},
            "timeout_secs": 4
        }"#;
        let cfg = CrawlConfig::from_json(json).unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.scheme, PageAddress::query_param("page"));
        assert_eq!(cfg.max_pages, 3);
        assert_eq!(cfg.page_delay, DelayRange::new(0.5, 1.5));
        assert_eq!(cfg.item_delay, DelayRange::ZERO);
        assert_eq!(cfg.auto_stop, AutoStop::enabled(5));
        assert_eq!(cfg.unknown_value, "unknown");
        assert_eq!(cfg.rules.fields.len(), 2);
    }

    #[test]
    fn test_from_json_reports_config_error() {
        let err = CrawlConfig::from_json(r#"{"base_url": "https://x/"}"#).unwrap_err();
        assert!(err.is_config());
    }
}
