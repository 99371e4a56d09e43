// ABOUTME: Declarative selector rule set describing what to extract from a listing page.
// ABOUTME: Defines selector specs, ordered fallback chains, per-field options, and the rule set itself.

//! Selector rule definitions for record extraction.
//!
//! A rule set is a mapping from field name to an ordered fallback chain of
//! selector candidates. Two keys are distinguished: `item` selects each
//! record's root node and `next_page` selects the link to the following page
//! for link-driven pagination. Every other key is an output field.
//!
//! In JSON a field may be written as a single candidate, a list of
//! candidates, or an object with `selectors` plus per-field options:
//!
//! ```json
//! {
//!   "item": "li.result",
//!   "next_page": ["a[rel=next]", ".pager a.next"],
//!   "title": ["h3", ".title"],
//!   "link": "a",
//!   "thumb": [["img", "data-src"], ["img", "src"]],
//!   "summary": { "selectors": ["p.desc"], "max_chars": 200 }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Specifies how to select a value from the DOM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorSpec {
    /// A simple CSS selector string whose matched node's text is taken, e.g. "h3.title"
    Css(String),
    /// A CSS selector with attribute extraction, e.g. ["img", "src"]
    CssAttr(Vec<String>),
}

impl Default for SelectorSpec {
    fn default() -> Self {
        SelectorSpec::Css(String::new())
    }
}

impl From<&str> for SelectorSpec {
    fn from(css: &str) -> Self {
        SelectorSpec::Css(css.to_string())
    }
}

impl From<(&str, &str)> for SelectorSpec {
    fn from((css, attr): (&str, &str)) -> Self {
        SelectorSpec::CssAttr(vec![css.to_string(), attr.to_string()])
    }
}

/// Parses a selector spec into a CSS selector string and optional attribute name.
///
/// Returns (css_selector, optional_attribute).
pub fn parse_selector(selector: &SelectorSpec) -> (&str, Option<&str>) {
    match selector {
        SelectorSpec::Css(css) => (css.as_str(), None),
        SelectorSpec::CssAttr(parts) => match parts.as_slice() {
            [css, attr, ..] => (css.as_str(), Some(attr.as_str())),
            [css] => (css.as_str(), None),
            [] => ("", None),
        },
    }
}

/// Returns true when a CSS string denotes the item root itself rather than a descendant.
pub fn is_self_selector(css: &str) -> bool {
    let trimmed = css.trim();
    trimmed.is_empty() || trimmed == "&"
}

/// An ordered list of selector candidates; the first yielding a non-empty value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ChainRepr")]
pub struct SelectorChain(pub Vec<SelectorSpec>);

#[derive(Deserialize)]
#[serde(untagged)]
enum ChainRepr {
    One(String),
    Many(Vec<SelectorSpec>),
}

impl From<ChainRepr> for SelectorChain {
    fn from(repr: ChainRepr) -> Self {
        match repr {
            ChainRepr::One(css) => SelectorChain(vec![SelectorSpec::Css(css)]),
            ChainRepr::Many(specs) => SelectorChain(specs),
        }
    }
}

impl SelectorChain {
    /// Builds a chain from anything convertible to selector specs.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SelectorSpec>,
    {
        SelectorChain(candidates.into_iter().map(Into::into).collect())
    }

    pub fn candidates(&self) -> &[SelectorSpec] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// CSS strings of every candidate, excluding self selectors.
    pub fn css_strings(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(|spec| parse_selector(spec).0)
            .filter(|css| !is_self_selector(css))
    }
}

impl From<&str> for SelectorChain {
    fn from(css: &str) -> Self {
        SelectorChain(vec![SelectorSpec::from(css)])
    }
}

/// Extraction rule for one output field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "FieldRuleRepr")]
pub struct FieldRule {
    /// Fallback chain of candidates
    pub selectors: SelectorChain,
    /// Attribute to read instead of text, unless a candidate names its own
    pub attr: Option<String>,
    /// Force or deny absolute URL resolution; inferred from the field name when unset
    pub link: Option<bool>,
    /// Truncate the value to this many characters
    pub max_chars: Option<usize>,
    /// Skip the whole item when this field cannot be extracted
    pub required: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldRuleRepr {
    Chain(SelectorChain),
    Detailed(FieldOptions),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldOptions {
    selectors: SelectorChain,
    #[serde(default)]
    attr: Option<String>,
    #[serde(default)]
    link: Option<bool>,
    #[serde(default)]
    max_chars: Option<usize>,
    #[serde(default)]
    required: bool,
}

impl From<FieldRuleRepr> for FieldRule {
    fn from(repr: FieldRuleRepr) -> Self {
        match repr {
            FieldRuleRepr::Chain(selectors) => FieldRule {
                selectors,
                ..Default::default()
            },
            FieldRuleRepr::Detailed(opts) => FieldRule {
                selectors: opts.selectors,
                attr: opts.attr,
                link: opts.link,
                max_chars: opts.max_chars,
                required: opts.required,
            },
        }
    }
}

impl FieldRule {
    /// A rule with a single CSS candidate.
    pub fn css(css: &str) -> Self {
        Self::chain([css])
    }

    /// A rule with an ordered list of candidates.
    pub fn chain<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SelectorSpec>,
    {
        FieldRule {
            selectors: SelectorChain::new(candidates),
            ..Default::default()
        }
    }

    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    pub fn link(mut self, link: bool) -> Self {
        self.link = Some(link);
        self
    }

    pub fn max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Whether values of this field are resolved to absolute URLs.
    pub fn is_link(&self, name: &str) -> bool {
        self.link.unwrap_or_else(|| is_link_name(name))
    }

    /// Attribute read when a candidate does not name one itself.
    pub fn default_attr(&self, name: &str) -> Option<&str> {
        match self.attr.as_deref() {
            Some(attr) => Some(attr),
            None if self.is_link(name) => Some("href"),
            None => None,
        }
    }
}

fn is_link_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    matches!(lower.as_str(), "link" | "url" | "href") || lower.ends_with("_url")
}

/// Field names that carry structural meaning and never become output columns.
pub const RESERVED_FIELDS: &[&str] = &["item", "next_page"];

/// The complete rule set for one crawl.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorRules {
    /// Selects each record's root node
    pub item: SelectorChain,
    /// Selects the link to the following page (link-follow pagination)
    #[serde(default)]
    pub next_page: Option<SelectorChain>,
    /// Output fields, in column order
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldRule>,
}

impl SelectorRules {
    /// Creates a rule set with the given item selector and no fields.
    pub fn new(item: impl Into<SelectorChain>) -> Self {
        Self {
            item: item.into(),
            ..Default::default()
        }
    }

    /// Adds or replaces an output field.
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// Sets the next-page link selector.
    pub fn next_page(mut self, chain: impl Into<SelectorChain>) -> Self {
        self.next_page = Some(chain.into());
        self
    }

    /// Output column names, in the order records carry them.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Every CSS string referenced by the rule set.
    pub fn all_css(&self) -> impl Iterator<Item = &str> {
        self.item
            .css_strings()
            .chain(self.next_page.iter().flat_map(|c| c.css_strings()))
            .chain(self.fields.values().flat_map(|r| r.selectors.css_strings()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_flat_rule_set() {
        let json = r#"{
            "item": "li.result",
            "next_page": ["a[rel=next]", ".pager a.next"],
            "title": ["h3", ".title"],
            "link": "a",
            "thumb": [["img", "data-src"], ["img", "src"]],
            "summary": { "selectors": ["p.desc"], "max_chars": 200, "required": true }
        }"#;
        let rules: SelectorRules = serde_json::from_str(json).expect("deserialize");

        assert_eq!(rules.item, SelectorChain::from("li.result"));
        assert_eq!(rules.next_page.as_ref().map(|c| c.0.len()), Some(2));
        assert_eq!(
            rules.field_names().collect::<Vec<_>>(),
            vec!["link", "summary", "thumb", "title"]
        );

        let thumb = &rules.fields["thumb"];
        assert_eq!(
            thumb.selectors.0[0],
            SelectorSpec::CssAttr(vec!["img".to_string(), "data-src".to_string()])
        );

        let summary = &rules.fields["summary"];
        assert_eq!(summary.max_chars, Some(200));
        assert!(summary.required);
    }

    #[test]
    fn test_missing_item_is_rejected() {
        let result = serde_json::from_str::<SelectorRules>(r#"{"title": "h3"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_option_is_rejected() {
        let json = r#"{"item": "li", "title": {"selectors": "h3", "max_len": 3}}"#;
        assert!(serde_json::from_str::<SelectorRules>(json).is_err());
    }

    #[test]
    fn test_link_inference() {
        let rule = FieldRule::css("a");
        assert!(rule.is_link("link"));
        assert!(rule.is_link("image_url"));
        assert!(rule.is_link("URL"));
        assert!(!rule.is_link("title"));
        assert!(!rule.clone().link(false).is_link("link"));
        assert!(rule.clone().link(true).is_link("title"));
    }

    #[test]
    fn test_default_attr() {
        assert_eq!(FieldRule::css("a").default_attr("link"), Some("href"));
        assert_eq!(FieldRule::css("a").default_attr("title"), None);
        assert_eq!(
            FieldRule::css("img").attr("src").default_attr("image_url"),
            Some("src")
        );
    }

    #[test]
    fn test_parse_selector_forms() {
        assert_eq!(parse_selector(&SelectorSpec::from("div.a")), ("div.a", None));
        assert_eq!(
            parse_selector(&SelectorSpec::from(("img", "src"))),
            ("img", Some("src"))
        );
        assert_eq!(
            parse_selector(&SelectorSpec::CssAttr(vec!["img".to_string()])),
            ("img", None)
        );
        assert_eq!(parse_selector(&SelectorSpec::CssAttr(vec![])), ("", None));
    }

    #[test]
    fn test_all_css_skips_self_selectors() {
        let rules = SelectorRules::new("a.item")
            .field("title", FieldRule::chain(["&", "span"]))
            .next_page("a.next");
        let css: Vec<&str> = rules.all_css().collect();
        assert_eq!(css, vec!["a.item", "a.next", "span"]);
    }
}
