//! pr-crawler main entry point
//!
//! This is the command-line interface for the resumable pull-request crawler.

use anyhow::{bail, Context};
use clap::Parser;
use pr_crawler::config::{
    apply_env_overrides, load_config_with_hash, validate, Config, CrawlWindow, Credentials,
};
use pr_crawler::crawler::{CollectionSummary, Coordinator, StopSignal};
use pr_crawler::model::Collection;
use pr_crawler::output::{export_collections, print_summary};
use pr_crawler::storage::FileCheckpointStore;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// pr-crawler: a resumable pull-request harvester
///
/// Crawls the pull requests of one or more repositories page by page,
/// collecting who authored, reviewed, committed to and commented on each one.
/// Progress is checkpointed after every page, so an interrupted run picks up
/// where it left off.
#[derive(Parser, Debug)]
#[command(name = "pr-crawler")]
#[command(version)]
#[command(about = "A resumable pull-request crawler", long_about = None)]
struct Cli {
    /// Repositories to crawl as owner/name (overrides the config list)
    #[arg(value_name = "COLLECTION")]
    collections: Vec<Collection>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Stop each collection after this many pages (resumable)
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Fetch only these pages of a single collection, leaving the checkpoint alone
    #[arg(long, value_delimiter = ',', value_name = "PAGES", conflicts_with = "retry_skipped")]
    pages: Vec<u32>,

    /// Fetch again every page previously recorded as skipped
    #[arg(long)]
    retry_skipped: bool,

    /// Only convert existing record logs to CSV
    #[arg(long, conflicts_with_all = ["dry_run", "skip_export"])]
    export_only: bool,

    /// Do not write the CSV export after crawling
    #[arg(long)]
    skip_export: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // .env may hold the token and the date window
    dotenv::dotenv().ok();

    let config = build_config(&cli)?;
    let window = CrawlWindow::parse(&config.crawler.start_date, &config.crawler.end_date)?;

    if cli.dry_run {
        handle_dry_run(&config, &window);
        return Ok(());
    }

    if cli.export_only {
        let failed = run_export(&config, &window);
        if !failed.is_empty() {
            bail!("CSV export failed for: {}", failed.join(", "));
        }
        return Ok(());
    }

    let summaries = handle_crawl(&cli, &config).await?;

    let export_failed = if config.output.export_csv && !cli.skip_export {
        run_export(&config, &window)
    } else {
        Vec::new()
    };

    // printed before any error return so skipped pages are always listed
    if !cli.quiet {
        print_summary(&summaries);
    }

    let failed: Vec<String> = summaries
        .iter()
        .filter(|s| s.outcome.is_failure())
        .map(|s| s.collection.to_string())
        .collect();

    if !failed.is_empty() {
        bail!("{} collection(s) did not finish: {}", failed.len(), failed.join(", "));
    }

    if !export_failed.is_empty() {
        bail!("CSV export failed for: {}", export_failed.join(", "));
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pr_crawler=info,warn"),
            1 => EnvFilter::new("pr_crawler=debug,info"),
            2 => EnvFilter::new("pr_crawler=trace,debug"),
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

/// Loads the config file (if any), then layers environment and CLI overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if apply_env_overrides(&mut config, |name| std::env::var(name).ok()) {
        tracing::info!(
            "Crawl window from environment: {} to {}",
            config.crawler.start_date,
            config.crawler.end_date
        );
    }

    if !cli.collections.is_empty() {
        config.collections = cli.collections.clone();
    }

    if cli.max_pages.is_some() {
        config.crawler.max_pages = cli.max_pages;
    }

    validate(&config).context("Invalid configuration")?;

    if config.collections.is_empty() {
        bail!("No collections to crawl: pass owner/name arguments or list them under `collections` in the config file");
    }

    Ok(config)
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, window: &CrawlWindow) {
    println!("=== pr-crawler Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Token variable: {}", config.api.token_env);
    println!("  User agent: {}", config.api.user_agent);

    println!("\nCrawler Configuration:");
    println!("  Window: {} to {}", window.start, window.end);
    println!("  Page size: {}", config.crawler.per_page);
    println!(
        "  Retries: {} (backoff {}s per attempt)",
        config.crawler.max_retries, config.crawler.backoff_seconds
    );
    println!(
        "  Rate-limit floor: {}s",
        config.crawler.rate_limit_floor_seconds
    );
    println!(
        "  Item spacing: {}ms, {} items in flight",
        config.crawler.item_delay_ms, config.crawler.max_concurrent_items
    );
    if let Some(max_pages) = config.crawler.max_pages {
        println!("  Page limit per collection: {}", max_pages);
    }

    let store = FileCheckpointStore::new(&config.output.data_dir);
    println!("\nCollections ({}):", config.collections.len());
    for collection in &config.collections {
        let resume = match store.checkpoint_state(collection) {
            Ok(Some(state)) => format!("resume at page {}", state.last_completed_page + 1),
            Ok(None) => "start at page 1".to_string(),
            Err(e) => format!("unreadable checkpoint: {}", e),
        };
        println!("  - {} ({})", collection, resume);
    }

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir);
    println!("  CSV export: {}", config.output.export_csv);

    println!("\n✓ Configuration is valid");
}

/// Runs the crawl, a page re-run, or a skipped-page retry
async fn handle_crawl(cli: &Cli, config: &Config) -> anyhow::Result<Vec<CollectionSummary>> {
    let credentials = Credentials::from_env(&config.api.token_env)?;
    let store = FileCheckpointStore::new(&config.output.data_dir);
    let mut coordinator = Coordinator::new(config, &credentials, store)?;

    spawn_interrupt_handler(coordinator.stop_signal());

    if !cli.pages.is_empty() {
        let collection = match config.collections.as_slice() {
            [collection] => collection,
            _ => bail!("--pages needs exactly one collection"),
        };
        tracing::info!("Re-fetching pages {:?} of {}", cli.pages, collection);
        return Ok(vec![coordinator.rerun_pages(collection, &cli.pages).await]);
    }

    if cli.retry_skipped {
        let mut summaries = Vec::with_capacity(config.collections.len());
        for collection in &config.collections {
            summaries.push(coordinator.retry_skipped(collection).await);
        }
        return Ok(summaries);
    }

    tracing::info!(
        "Crawling {} collection(s): {}",
        config.collections.len(),
        config
            .collections
            .iter()
            .map(Collection::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(coordinator.run(&config.collections).await)
}

/// First Ctrl-C stops at the next page boundary, a second one exits at once
fn spawn_interrupt_handler(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current page (Ctrl-C again to quit now)");
        stop.request_stop();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Second interrupt, exiting; the current page will be fetched again on resume");
            std::process::exit(130);
        }
    });
}

/// Writes the CSV export for every configured collection
///
/// Returns the collections whose export failed; errors are already logged.
fn run_export(config: &Config, window: &CrawlWindow) -> Vec<String> {
    let data_dir = Path::new(&config.output.data_dir);
    let mut failed = Vec::new();

    for export in export_collections(data_dir, &config.collections, window) {
        match export.result {
            Ok(0) => {}
            Ok(rows) => println!(
                "✓ {}: {} records exported to {}",
                export.collection,
                rows,
                export.csv_path.display()
            ),
            Err(_) => failed.push(export.collection.to_string()),
        }
    }

    failed
}
