//! Sumi-Spider main entry point
//!
//! This is the command-line interface for the Sumi-Spider fetch scheduler.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_spider::config::{load_config, Config};
use sumi_spider::{rate_limit_key, HttpFetcher, Scheduler};
use tracing_subscriber::EnvFilter;

/// Sumi-Spider: a polite, host-aware fetch scheduler
///
/// Fetches every given URL, spacing requests to the same registrable domain
/// by the configured interval while different domains proceed in parallel.
#[derive(Parser, Debug)]
#[command(name = "sumi-spider")]
#[command(version = "1.0.0")]
#[command(about = "A polite, host-aware fetch scheduler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to fetch
    #[arg(value_name = "URLS")]
    urls: Vec<String>,

    /// Read additional URLs from a file, one per line
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show how URLs would be grouped without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config).map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let mut urls = cli.urls;
    if let Some(path) = &cli.input {
        urls.extend(read_url_file(path)?);
    }

    if cli.dry_run {
        handle_dry_run(&config, &urls);
        return Ok(());
    }

    handle_fetch(&config, &urls).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_spider=info,warn"),
            1 => EnvFilter::new("sumi_spider=debug,info"),
            2 => EnvFilter::new("sumi_spider=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Reads URLs from a file, skipping blank lines and `#` comments
fn read_url_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Handles the --dry-run mode: validates config and shows the host of each URL
fn handle_dry_run(config: &Config, urls: &[String]) {
    println!("=== Sumi-Spider Dry Run ===\n");

    println!("Scheduler Configuration:");
    println!("  Default interval: {}ms", config.scheduler.default_interval);
    println!("  Max workers: {}", config.scheduler.max_workers);
    println!("  Queue capacity: {}", config.scheduler.queue_capacity);

    println!("\nUser Agent: {}", config.user_agent.user_agent_string());

    println!("\nInterval Overrides ({}):", config.intervals.len());
    for entry in &config.intervals {
        println!("  - {}: {}ms", entry.host, entry.interval);
    }

    println!("\nURLs ({}):", urls.len());
    for url in urls {
        match rate_limit_key(url) {
            Ok(host) => println!("  - {} [{}]", url, host),
            Err(e) => println!("  - {} [invalid: {}]", url, e),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main fetch operation
async fn handle_fetch(config: &Config, urls: &[String]) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::from_config(&config.user_agent)
        .context("Failed to build HTTP client")?;
    let scheduler = Scheduler::from_config(config, Arc::new(fetcher))?;

    let mut queued = 0usize;
    for url in urls {
        let shown = url.clone();
        let callback = move |body: String| println!("{}\t{} bytes", shown, body.len());

        match scheduler.add_task(url, callback) {
            Ok(true) => queued += 1,
            Ok(false) => tracing::warn!("Task for {} was not accepted", url),
            Err(e) => tracing::error!("Skipping {}: {}", url, e),
        }
    }
    tracing::info!("Queued {} of {} URLs", queued, urls.len());

    scheduler.shutdown(false);

    tokio::select! {
        _ = scheduler.await_termination() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            tracing::warn!("Interrupted; abandoning {} queued tasks", scheduler.pending_count());
            scheduler.shutdown(true);
            scheduler.await_termination().await;
        }
    }

    tracing::info!("All tasks finished");
    Ok(())
}
