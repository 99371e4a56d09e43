// ABOUTME: Record, StopReason, CrawlSummary and CrawlResult types handed to the caller after a crawl.
// ABOUTME: Includes small helpers for tabular consumers and summary formatting.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extracted record. Immutable once built; every record of a crawl carries the same field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Page number the record was found on
    pub page: u32,
    /// 1-based position of the item root within its page
    pub index: usize,
    /// URL of the page the record was found on
    pub source_url: String,
    pub extracted_at: DateTime<Utc>,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// Returns the value of a field, if the rule set defines it.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Why a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every requested page was processed
    ReachedLimit,
    /// An empty page, a non-2xx response, or a missing next link
    NoMoreData,
    /// Auto-stop saw fewer records on a page than its threshold
    BelowThreshold,
    /// A network failure or timeout aborted the crawl
    FetchError,
    /// The caller cancelled the crawl
    Cancelled,
}

impl StopReason {
    /// True only when the crawl processed every page it was asked for.
    pub fn is_complete(&self) -> bool {
        matches!(self, StopReason::ReachedLimit)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::ReachedLimit => "reached page limit",
            StopReason::NoMoreData => "no more data",
            StopReason::BelowThreshold => "below auto-stop threshold",
            StopReason::FetchError => "fetch error",
            StopReason::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Summary returned with every crawl, including crawls that collected nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlSummary {
    /// Pages that were fetched and extracted
    pub pages_processed: u32,
    /// Number of the last page that completed
    pub last_page: Option<u32>,
    pub stop_reason: StopReason,
    pub total_records: usize,
    pub elapsed_ms: u64,
    /// Message of the signal or failure that ended the crawl, if any
    pub error: Option<String>,
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records from {} pages in {}ms ({})",
            self.total_records, self.pages_processed, self.elapsed_ms, self.stop_reason
        )?;
        if let Some(ref err) = self.error {
            write!(f, ": {}", err)?;
        }
        Ok(())
    }
}

/// Records in crawl order plus the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub summary: CrawlSummary,
    /// Field names of the rule set, in the order records carry them
    #[serde(default)]
    pub fields: Vec<String>,
    pub records: Vec<Record>,
}

impl CrawlResult {
    /// Column names shared by every record, metadata first. Stable even when no record was found.
    pub fn columns(&self) -> Vec<String> {
        let mut cols = vec![
            "page".to_string(),
            "index".to_string(),
            "source_url".to_string(),
            "extracted_at".to_string(),
        ];
        cols.extend(self.fields.iter().cloned());
        cols
    }

    /// Records found on a given page, in item order.
    pub fn page(&self, page: u32) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(move |r| r.page == page)
    }
}
