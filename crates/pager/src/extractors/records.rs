// ABOUTME: Record extraction from one parsed listing page using a selector rule set.
// ABOUTME: Selects item roots, applies per-field fallback chains, and recovers per-item failures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

use crate::error::CrawlError;
use crate::extractors::rules::SelectorRules;
use crate::extractors::select::{extract_field, select_roots};
use crate::result::Record;

/// Per-page inputs to extraction.
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    pub page: u32,
    /// URL the page was fetched from; link fields resolve against it
    pub url: &'a Url,
    /// Value stored for a field no candidate could extract
    pub unknown: &'a str,
    pub max_items: Option<usize>,
    pub extracted_at: DateTime<Utc>,
}

/// Outcome of extracting one page.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    /// Item roots the `item` rule matched, before any cap
    pub item_roots: usize,
    pub records: Vec<Record>,
    /// Items dropped because a required field was missing
    pub skipped: usize,
}

impl PageExtraction {
    /// An empty page is the primary no-more-data signal.
    pub fn is_empty_page(&self) -> bool {
        self.item_roots == 0
    }
}

/// Extracts every record on a page.
///
/// Zero item roots is not an error; it yields an empty extraction that the
/// controller treats as end of data. A failing item is logged and skipped.
pub fn extract_records(doc: &Html, rules: &SelectorRules, ctx: &PageContext<'_>) -> PageExtraction {
    let roots = select_roots(doc, &rules.item);
    let item_roots = roots.len();
    let take = ctx.max_items.unwrap_or(usize::MAX);

    let mut records = Vec::with_capacity(item_roots.min(take));
    let mut skipped = 0;

    for (position, root) in roots.iter().take(take).enumerate() {
        match extract_item(root, position + 1, rules, ctx) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(page = ctx.page, item = position + 1, error = %err, "skipping item");
                skipped += 1;
            }
        }
    }

    debug!(
        page = ctx.page,
        item_roots,
        records = records.len(),
        skipped,
        "extracted page"
    );

    PageExtraction {
        item_roots,
        records,
        skipped,
    }
}

/// Builds one record; fields that miss fall back to the unknown sentinel.
fn extract_item(
    root: &ElementRef<'_>,
    index: usize,
    rules: &SelectorRules,
    ctx: &PageContext<'_>,
) -> Result<Record, CrawlError> {
    let mut fields = BTreeMap::new();

    for (name, rule) in &rules.fields {
        let value = match extract_field(root, name, rule, ctx.url) {
            Some(value) => value,
            None if rule.required => {
                return Err(CrawlError::extract(
                    ctx.url.as_str(),
                    "ExtractItem",
                    Some(anyhow::anyhow!("required field `{}` not found", name)),
                )
                .with_page(ctx.page));
            }
            None => ctx.unknown.to_string(),
        };
        fields.insert(name.clone(), value);
    }

    Ok(Record {
        page: ctx.page,
        index,
        source_url: ctx.url.to_string(),
        extracted_at: ctx.extracted_at,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::rules::FieldRule;
    use pretty_assertions::assert_eq;

    const LISTING: &str = r#"
        <html><body>
        <div class="spot">
            <a class="ttl" href="/spot/1">Castle Park</a>
            <span class="area">Utsunomiya</span>
        </div>
        <div class="spot">
            <a class="ttl" href="/spot/2">River Walk</a>
        </div>
        <div class="spot">
            <span class="area">Nikko</span>
        </div>
        </body></html>
    "#;

    fn rules() -> SelectorRules {
        SelectorRules::new("div.spot")
            .field("title", FieldRule::css("a.ttl"))
            .field("link", FieldRule::css("a.ttl"))
            .field("area", FieldRule::css("span.area"))
    }

    fn ctx(url: &Url) -> PageContext<'_> {
        PageContext {
            page: 3,
            url,
            unknown: "unknown",
            max_items: None,
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn test_records_have_uniform_fields() {
        let doc = Html::parse_document(LISTING);
        let url = Url::parse("https://example.com/spots/3.html").unwrap();
        let out = extract_records(&doc, &rules(), &ctx(&url));

        assert_eq!(out.item_roots, 3);
        assert_eq!(out.records.len(), 3);
        for record in &out.records {
            assert_eq!(
                record.fields.keys().collect::<Vec<_>>(),
                vec!["area", "link", "title"]
            );
            assert_eq!(record.page, 3);
            assert_eq!(record.source_url, "https://example.com/spots/3.html");
        }

        assert_eq!(out.records[0].get("link"), Some("https://example.com/spot/1"));
        assert_eq!(out.records[1].get("area"), Some("unknown"));
        assert_eq!(out.records[2].get("title"), Some("unknown"));
        assert_eq!(
            out.records.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_required_field_skips_item() {
        let doc = Html::parse_document(LISTING);
        let url = Url::parse("https://example.com/spots/").unwrap();
        let rules = rules().field("title", FieldRule::css("a.ttl").required());
        let out = extract_records(&doc, &rules, &ctx(&url));

        assert_eq!(out.item_roots, 3);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.records[1].index, 2);
    }

    #[test]
    fn test_zero_roots_is_empty_page() {
        let doc = Html::parse_document("<html><body><p>No results</p></body></html>");
        let url = Url::parse("https://example.com/spots/9.html").unwrap();
        let out = extract_records(&doc, &rules(), &ctx(&url));

        assert!(out.is_empty_page());
        assert!(out.records.is_empty());
    }

    #[test]
    fn test_max_items_caps_records() {
        let doc = Html::parse_document(LISTING);
        let url = Url::parse("https://example.com/spots/").unwrap();
        let mut context = ctx(&url);
        context.max_items = Some(2);
        let out = extract_records(&doc, &rules(), &context);

        assert_eq!(out.item_roots, 3);
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn test_custom_unknown_sentinel() {
        let doc = Html::parse_document(LISTING);
        let url = Url::parse("https://example.com/spots/").unwrap();
        let mut context = ctx(&url);
        context.unknown = "N/A";
        let out = extract_records(&doc, &rules(), &context);

        assert_eq!(out.records[2].get("link"), Some("N/A"));
    }
}
