//! Habr-Harvest main entry point
//!
//! This is the command-line interface for the Habr-Harvest hub crawler.

use anyhow::Context;
use clap::Parser;
use habr_harvest::config::{load_config_with_hash, Config};
use habr_harvest::crawler::{run_once, run_scheduler, CrawlContext};
use habr_harvest::output::{load_statistics, print_statistics};
use habr_harvest::state::NewHub;
use habr_harvest::storage::{open_storage, SharedStorage, Storage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Habr-Harvest: a scheduled hub crawler
///
/// Habr-Harvest periodically walks the article listings of configured hubs,
/// fetches every discovered article and stores the results in SQLite,
/// honoring each hub's re-crawl interval and worker limit.
#[derive(Parser, Debug)]
#[command(name = "habr-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A scheduled hub crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Store the [[hub]] entries of the config before crawling
    #[arg(long)]
    seed: bool,

    /// Crawl the hubs that are due right now, wait for them and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    once: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "once"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "once"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let mut storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to open {}", config.output.database_path))?;

    if cli.seed {
        handle_seed(&config, &mut storage)?;
    }

    if cli.stats {
        return handle_stats(&config, &storage);
    }

    let ctx = CrawlContext::from_config(&config, SharedStorage::new(storage))?;

    if cli.once {
        handle_once(&ctx).await
    } else {
        handle_schedule(ctx).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("habr_harvest=info,warn"),
            1 => EnvFilter::new("habr_harvest=debug,info"),
            2 => EnvFilter::new("habr_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Habr-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  API base: {}", config.crawler.api_base);
    println!("  Site base: {}", config.crawler.site_base);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Attempts per request: {}", config.crawler.max_attempts);
    println!(
        "  Jitter: {}-{}ms",
        config.crawler.jitter_min_ms, config.crawler.jitter_max_ms
    );
    println!("  Flush interval: {}ms", config.crawler.flush_interval_ms);
    println!(
        "  Schedule interval: {}s",
        config.crawler.schedule_interval_secs
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nHubs ({}):", config.hubs.len());
    for hub in &config.hubs {
        println!(
            "  - {} ({})",
            hub.hub_link,
            hub.name.as_deref().unwrap_or("unnamed")
        );
        println!(
            "    every {}s, {} workers, {} links/page, {} pages max, batches of {}",
            hub.check_interval_secs,
            hub.max_workers,
            hub.links_per_page,
            hub.max_pages,
            hub.batch_size
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles --seed: stores configured hubs that are not in the database yet
fn handle_seed(config: &Config, storage: &mut dyn Storage) -> anyhow::Result<()> {
    if config.hubs.is_empty() {
        tracing::warn!("--seed given but the configuration has no [[hub]] entries");
        return Ok(());
    }

    for entry in &config.hubs {
        let id = storage
            .seed_hub(&NewHub::from(entry))
            .with_context(|| format!("failed to seed {}", entry.hub_link))?;
        tracing::info!("Hub {} -> {}", id, entry.hub_link);
    }

    tracing::info!("Seeded {} hub(s)", config.hubs.len());
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, storage: &dyn Storage) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let stats = load_statistics(storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --once: one scheduling pass, waiting for every started crawl
async fn handle_once(ctx: &CrawlContext) -> anyhow::Result<()> {
    let finished = run_once(ctx).await?;

    if finished.is_empty() {
        tracing::info!("No hubs are due");
    }
    for hub in &finished {
        tracing::info!("[{}] Finished with status {}", hub.label(), hub.status);
    }

    Ok(())
}

/// Handles the default mode: run the scheduler until Ctrl-C
async fn handle_schedule(ctx: CrawlContext) -> anyhow::Result<()> {
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl-C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    run_scheduler(ctx, shutdown).await?;
    Ok(())
}
