// ABOUTME: CLI binary for the pager listing extractor.
// ABOUTME: Runs one crawl from a JSON config file, or previews a page's structure, and prints JSON.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use digests_pager::preview::DEFAULT_CANDIDATES;
use digests_pager::{CrawlConfig, CrawlControl, Crawler, SelectorChain};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pager")]
#[command(about = "Extract records from every page of a paginated listing")]
struct Args {
    /// Crawl configuration file (JSON)
    #[arg(short = 'c', long = "config", required_unless_present = "preview")]
    config: Option<PathBuf>,

    /// Fetch one page and report how many elements each candidate item selector matches
    #[arg(long = "preview", value_name = "URL", conflicts_with = "config")]
    preview: Option<String>,

    /// Candidate item selector for --preview (repeatable)
    #[arg(long = "candidate", requires = "preview")]
    candidates: Vec<String>,

    /// Request timeout in seconds for --preview
    #[arg(long = "timeout", default_value_t = 10.0)]
    timeout: f64,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Emit single-line JSON
    #[arg(long = "compact")]
    compact: bool,

    /// Override max_pages from the config file
    #[arg(long = "max-pages")]
    max_pages: Option<u32>,

    /// Log level when RUST_LOG is unset
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

fn format_output<T: Serialize>(result: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(result)
    } else {
        serde_json::to_string_pretty(result)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let crawler = match Crawler::builder().build() {
        Ok(crawler) => crawler,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };

    if let Some(url) = &args.preview {
        return run_preview(&crawler, url, &args).await;
    }
    let Some(config_path) = &args.config else {
        eprintln!("error: --config is required");
        return ExitCode::from(1);
    };

    let mut config = match CrawlConfig::from_path(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing with records collected so far");
            on_signal.cancel();
        }
    });

    let control = CrawlControl::new().with_cancel(cancel);
    let result = match crawler.crawl_with(&config, control).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };
    info!(summary = %result.summary, "done");

    emit(&result, &args)
}

async fn run_preview(crawler: &Crawler, url: &str, args: &Args) -> ExitCode {
    let candidates = if args.candidates.is_empty() {
        SelectorChain::new(DEFAULT_CANDIDATES.iter().copied())
    } else {
        SelectorChain::new(args.candidates.iter().map(String::as_str))
    };
    let timeout = match Duration::try_from_secs_f64(args.timeout) {
        Ok(timeout) if !timeout.is_zero() => timeout,
        _ => {
            eprintln!("error: --timeout must be a positive number of seconds");
            return ExitCode::from(1);
        }
    };

    match crawler.preview(url, &candidates, timeout).await {
        Ok(preview) => {
            if preview.best().is_none() {
                warn!(url, "no candidate selector matched any element");
            }
            emit(&preview, args)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn emit<T: Serialize>(value: &T, args: &Args) -> ExitCode {
    let output = match format_output(value, args.compact) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("error serializing result: {}", e);
            return ExitCode::from(1);
        }
    };

    if let Some(output_path) = &args.output {
        if let Err(e) = fs::write(output_path, &output) {
            eprintln!("error writing to {:?}: {}", output_path, e);
            return ExitCode::from(1);
        }
    } else {
        println!("{}", output);
    }

    ExitCode::SUCCESS
}
