// ABOUTME: The Crawler drives a crawl page by page: sequence URL, fetch, extract, decide, pace.
// ABOUTME: Owns the transient crawl state and returns every committed record with a stop reason.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::Utc;
use scraper::Html;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::extractors::records::{extract_records, PageContext, PageExtraction};
use crate::options::{CrawlerBuilder, Options};
use crate::extractors::rules::SelectorChain;
use crate::pagination::{pause, resolve, PreviousPage};
use crate::preview::{preview_fetched, validate_candidates, PagePreview};
use crate::resource::{fetch, FetchOptions, FetchResult};
use crate::result::{CrawlResult, CrawlSummary, Record, StopReason};

/// Progress notifications. They never influence the crawl itself.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    PageStarted {
        page: u32,
        url: String,
    },
    PageCompleted {
        page: u32,
        records: usize,
        total_records: usize,
    },
    Waiting {
        page: u32,
        delay: Duration,
    },
    Finished(CrawlSummary),
}

/// Caller-side handles for one crawl: cancellation and an optional progress channel.
#[derive(Debug, Clone, Default)]
pub struct CrawlControl {
    pub cancel: CancellationToken,
    pub events: Option<UnboundedSender<CrawlEvent>>,
}

impl CrawlControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<CrawlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref tx) = self.events {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }
}

/// Controller phases, in the order a page moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Fetching(u32),
    Extracting(u32),
    Deciding(u32),
    Terminated(StopReason),
}

/// Mutable state of one crawl, owned by the controller loop.
struct CrawlState {
    phase: CrawlPhase,
    fields: Vec<String>,
    records: Vec<Record>,
    pages_processed: u32,
    last_page: Option<u32>,
    error: Option<String>,
    visited: HashSet<String>,
    started: Instant,
}

impl CrawlState {
    fn new(fields: Vec<String>) -> Self {
        Self {
            phase: CrawlPhase::Idle,
            fields,
            records: Vec::new(),
            pages_processed: 0,
            last_page: None,
            error: None,
            visited: HashSet::new(),
            started: Instant::now(),
        }
    }

    fn enter(&mut self, phase: CrawlPhase) {
        debug!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }

    /// Appends a fully extracted page. Pages are committed whole or not at all.
    fn commit(&mut self, page: u32, records: Vec<Record>) {
        self.records.extend(records);
        self.pages_processed += 1;
        self.last_page = Some(page);
    }

    /// Records the signal that ended the crawl and maps it to a stop reason.
    fn stop(&mut self, err: CrawlError) -> StopReason {
        let reason = stop_reason_for(&err);
        self.error = Some(err.to_string());
        reason
    }

    fn finish(mut self, reason: StopReason) -> CrawlResult {
        self.enter(CrawlPhase::Terminated(reason));
        CrawlResult {
            summary: CrawlSummary {
                pages_processed: self.pages_processed,
                last_page: self.last_page,
                stop_reason: reason,
                total_records: self.records.len(),
                elapsed_ms: self.started.elapsed().as_millis() as u64,
                error: self.error,
            },
            fields: self.fields,
            records: self.records,
        }
    }
}

/// Everything the controller needs from one page once its document is gone.
struct PageOutcome {
    extraction: PageExtraction,
    /// Resolved next-page URL for link-follow crawls that continue
    next: Option<Result<String, CrawlError>>,
}

/// Runs paginated crawls.
pub struct Crawler {
    opts: Options,
    http_client: reqwest::Client,
}

impl Crawler {
    /// Create a new CrawlerBuilder for configuring the crawler.
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder::new()
    }

    /// Create a new Crawler with the given options.
    pub fn new(opts: Options) -> Result<Self, CrawlError> {
        let http_client = match opts.http_client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .user_agent(&opts.user_agent)
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .map_err(|e| {
                    CrawlError::config(
                        "Build",
                        anyhow::anyhow!("failed to build HTTP client: {}", e),
                    )
                })?,
        };

        Ok(Self { opts, http_client })
    }

    /// Fetches one page and reports how many elements each candidate item selector matches.
    ///
    /// Unlike a crawl, any fetch failure, including a non-2xx status, is returned as `Err`.
    pub async fn preview(
        &self,
        url: &str,
        candidates: &SelectorChain,
        timeout: Duration,
    ) -> Result<PagePreview, CrawlError> {
        validate_candidates(candidates)?;
        let fetch_opts = FetchOptions {
            headers: self.opts.headers.clone(),
            timeout,
        };
        let fetched = fetch(&self.http_client, url, &fetch_opts).await?;
        let preview = preview_fetched(&fetched, candidates);
        info!(
            url,
            best = preview.best().map(|c| c.selector.as_str()),
            "previewed page structure"
        );
        Ok(preview)
    }

    /// Runs a crawl to completion.
    pub async fn crawl(&self, config: &CrawlConfig) -> Result<CrawlResult, CrawlError> {
        self.crawl_with(config, CrawlControl::default()).await
    }

    /// Runs a crawl with cancellation and progress reporting.
    ///
    /// Only configuration and scheme problems are returned as `Err`, and they
    /// are detected before any request. Every other ending, including fetch
    /// failures and cancellation, yields a `CrawlResult` holding the records
    /// committed so far.
    pub async fn crawl_with(
        &self,
        config: &CrawlConfig,
        control: CrawlControl,
    ) -> Result<CrawlResult, CrawlError> {
        config.validate()?;

        let fetch_opts = FetchOptions {
            headers: self.opts.headers.clone(),
            timeout: config.timeout(),
        };
        let last = config.last_page();
        let mut state = CrawlState::new(config.rules.field_names().map(String::from).collect());
        let mut page = config.start_page;
        let mut next_url: Option<String> = None;

        info!(
            base_url = %config.base_url,
            scheme = ?config.scheme,
            first_page = page,
            last_page = last,
            "starting crawl"
        );

        let reason = loop {
            if control.cancel.is_cancelled() {
                break state.stop(CrawlError::cancelled(&config.base_url, "Crawl").with_page(page));
            }

            state.enter(CrawlPhase::Fetching(page));
            let url = match next_url.take() {
                Some(url) => url,
                None => match resolve(&config.base_url, page, &config.scheme, None) {
                    Ok(url) => url,
                    Err(e) => {
                        error!(page, error = %e, "could not resolve page URL");
                        break state.stop(e);
                    }
                },
            };
            state.visited.insert(url.clone());

            info!(page, url = %url, "fetching page");
            control.emit(CrawlEvent::PageStarted {
                page,
                url: url.clone(),
            });

            let fetched = tokio::select! {
                biased;
                _ = control.cancel.cancelled() => None,
                res = fetch(&self.http_client, &url, &fetch_opts) => Some(res),
            };
            let fetched = match fetched {
                None => break state.stop(CrawlError::cancelled(&url, "Fetch").with_page(page)),
                Some(Ok(fetched)) => fetched,
                Some(Err(e)) if e.is_soft() => {
                    warn!(page, url = %url, status = ?e.status, "non-success status, treating as end of data");
                    break state.stop(e.with_page(page));
                }
                Some(Err(e)) => {
                    let e = e.with_page(page);
                    error!(page, url = %url, error = %e, "fetch failed");
                    break state.stop(e);
                }
            };

            state.enter(CrawlPhase::Extracting(page));
            let wants_next = config.scheme.is_link_follow() && page < last;
            let outcome = match extract_page(&fetched, page, config, wants_next) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(page, error = %e, "page could not be extracted");
                    break state.stop(e);
                }
            };

            let PageOutcome { extraction, next } = outcome;
            let empty_page = extraction.is_empty_page();
            let records = extraction.records;
            let page_records = records.len();

            if !config.item_delay.is_zero()
                && !pace_items(page_records, config, &control.cancel).await
            {
                info!(page, "cancelled while pacing items; page discarded");
                break state.stop(CrawlError::cancelled(&fetched.final_url, "PaceItems").with_page(page));
            }

            state.commit(page, records);
            info!(
                page,
                records = page_records,
                total = state.records.len(),
                "page complete"
            );
            control.emit(CrawlEvent::PageCompleted {
                page,
                records: page_records,
                total_records: state.records.len(),
            });

            state.enter(CrawlPhase::Deciding(page));
            if empty_page {
                info!(page, "no items found, stopping");
                break StopReason::NoMoreData;
            }

            if let Some(next) = next {
                match next {
                    Ok(url) if state.visited.contains(&url) => {
                        warn!(page, url = %url, "next link points to a visited page, stopping");
                        break StopReason::NoMoreData;
                    }
                    Ok(url) => next_url = Some(url),
                    Err(e) => {
                        info!(page, "no next page link, stopping");
                        break state.stop(e);
                    }
                }
            }

            if config.auto_stop.enabled && page_records < config.auto_stop.threshold {
                info!(
                    page,
                    records = page_records,
                    threshold = config.auto_stop.threshold,
                    "below auto-stop threshold, stopping"
                );
                break StopReason::BelowThreshold;
            }

            if page >= last {
                break StopReason::ReachedLimit;
            }

            let delay = config.page_delay.sample();
            debug!(page, delay_ms = delay.as_millis() as u64, "waiting before next page");
            control.emit(CrawlEvent::Waiting { page, delay });
            if !pause(delay, &control.cancel).await {
                break state.stop(CrawlError::cancelled(&fetched.final_url, "Wait").with_page(page));
            }

            page += 1;
        };

        let result = state.finish(reason);
        info!(
            reason = %reason,
            pages = result.summary.pages_processed,
            records = result.summary.total_records,
            "crawl finished"
        );
        control.emit(CrawlEvent::Finished(result.summary.clone()));
        Ok(result)
    }
}

/// Soft signals end the crawl as end of data; everything else is a failure.
fn stop_reason_for(err: &CrawlError) -> StopReason {
    if err.is_soft() {
        StopReason::NoMoreData
    } else if err.is_cancelled() {
        StopReason::Cancelled
    } else {
        StopReason::FetchError
    }
}

/// Waits one sampled item delay per item transition. Returns false when cancelled.
async fn pace_items(items: usize, config: &CrawlConfig, cancel: &CancellationToken) -> bool {
    for _ in 1..items {
        if !pause(config.item_delay.sample(), cancel).await {
            return false;
        }
    }
    true
}

/// Decodes, parses and extracts one page. The parsed document never outlives this call.
fn extract_page(
    fetched: &FetchResult,
    page: u32,
    config: &CrawlConfig,
    wants_next: bool,
) -> Result<PageOutcome, CrawlError> {
    let page_url = Url::parse(&fetched.final_url).map_err(|e| {
        CrawlError::extract(
            fetched.final_url.as_str(),
            "ExtractPage",
            Some(anyhow::anyhow!("invalid page URL: {}", e)),
        )
        .with_page(page)
    })?;

    let (text, encoding) = fetched.decode();
    debug!(page, encoding, "decoded page");
    let doc = Html::parse_document(&text);

    let ctx = PageContext {
        page,
        url: &page_url,
        unknown: &config.unknown_value,
        max_items: config.max_items_per_page,
        extracted_at: Utc::now(),
    };
    let extraction = extract_records(&doc, &config.rules, &ctx);

    let next = match config.rules.next_page.as_ref() {
        Some(chain) if wants_next => {
            let prev = PreviousPage {
                url: &page_url,
                document: &doc,
                next_page: chain,
            };
            Some(resolve(&config.base_url, page + 1, &config.scheme, Some(&prev)))
        }
        _ => None,
    };

    Ok(PageOutcome { extraction, next })
}
