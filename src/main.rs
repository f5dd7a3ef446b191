//! Sumi-Trawl main entry point
//!
//! This is the command-line interface for the Sumi-Trawl data-source crawler.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_trawl::config::{load_config_with_hash, Config};
use sumi_trawl::crawler::{run_crawl, RunOptions};
use sumi_trawl::output::{format_markdown_summary, load_statistics, print_statistics, SqliteSink};
use sumi_trawl::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Trawl: a recursive data-source crawler
///
/// Sumi-Trawl walks filesystem trees, maildir mailboxes, web pages, feeds
/// and URL lists, and records every reachable entity with its metadata.
/// Unchanged entities are skipped on later runs.
#[derive(Parser, Debug)]
#[command(name = "sumi-trawl")]
#[command(version = "1.0.0")]
#[command(about = "A recursive data-source crawler", long_about = None)]
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

    /// Forget change tracking state and treat every entity as new
    #[arg(long)]
    fresh: bool,

    /// Crawl into memory and print the summary without writing any state
    #[arg(long, conflicts_with_all = ["stats", "fresh"])]
    dry_run: bool,

    /// Show statistics from the output database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    let options = RunOptions {
        fresh: cli.fresh,
        dry_run: cli.dry_run,
    };
    handle_crawl(config, config_hash, options).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_trawl=info,warn"),
            1 => EnvFilter::new("sumi_trawl=debug,info"),
            2 => EnvFilter::new("sumi_trawl=trace,debug"),
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

/// Handles the --stats mode: shows statistics from the output database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let sink = SqliteSink::open(Path::new(&config.output.database_path), 0)
        .context("Failed to open output database")?;
    let stats = load_statistics(&sink, None)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, options: RunOptions) -> anyhow::Result<()> {
    if options.dry_run {
        tracing::info!("Dry run: nothing will be written");
    } else if options.fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    }
    tracing::info!("Sources: {}", config.sources.len());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight entities");
            on_signal.cancel_and_wait().await;
        }
    });

    let summary = run_crawl(&config, &config_hash, &options, cancel)
        .await
        .context("Crawl failed")?;

    tracing::info!(
        "Crawl {}: {} visited, {} materialized, {} unmodified, {} errors",
        summary.status,
        summary.total_visited(),
        summary.total_materialized(),
        summary.total_unmodified(),
        summary.total_errors()
    );

    if options.dry_run {
        println!("{}", format_markdown_summary(&summary));
    }

    Ok(())
}
