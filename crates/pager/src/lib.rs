// ABOUTME: Main library entry point for the pager paginated listing extractor.
// ABOUTME: Re-exports the public API: Crawler, CrawlConfig, selector rules, pagination schemes, and results.

//! Pager - walks the pages of a paginated listing and extracts structured records.
//!
//! A crawl is described by a [`CrawlConfig`]: a base URL, a pagination scheme,
//! a set of CSS selector rules, and limits for pages, delays and auto-stop.
//! [`Crawler::crawl`] visits the pages in order and returns every record it
//! committed together with a [`CrawlSummary`] explaining why it stopped.
//!
//! # Example
//!
//! ```no_run
//! use digests_pager::{CrawlConfig, CrawlError, Crawler, FieldRule, PageAddress, SelectorRules};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CrawlError> {
//!     let rules = SelectorRules::new("div.event")
//!         .field("title", FieldRule::chain(["h2", "h3"]))
//!         .field("link", FieldRule::css("a"));
//!     let config = CrawlConfig::new(
//!         "https://example.com/events/",
//!         PageAddress::query_param("page"),
//!         rules,
//!     );
//!
//!     let crawler = Crawler::builder().build()?;
//!     let result = crawler.crawl(&config).await?;
//!     println!("{}", result.summary);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod extractors;
pub mod options;
pub mod pagination;
pub mod preview;
pub mod resource;
pub mod result;

pub use crate::config::{AutoStop, CrawlConfig};
pub use crate::crawler::{CrawlControl, CrawlEvent, CrawlPhase, Crawler};
pub use crate::error::{CrawlError, ErrorCode};
pub use crate::extractors::rules::{FieldRule, SelectorChain, SelectorRules, SelectorSpec};
pub use crate::options::{CrawlerBuilder, Options};
pub use crate::pagination::{DelayRange, PageAddress, SuffixStyle};
pub use crate::preview::{CandidateMatch, PagePreview};
pub use crate::result::{CrawlResult, CrawlSummary, Record, StopReason};
