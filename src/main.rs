//! Kumo main entry point
//!
//! Command-line interface for the fetch scheduler: reads a seed list,
//! generates one batch of fetch tasks, and drives the worker pool until
//! every task has been fetched or dropped.

use clap::Parser;
use kumo::config::load_config_with_hash;
use kumo::fetch::{run_retuner, run_worker, HttpFetcher, TaskMonitor};
use kumo::generate::{Candidate, Generator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Kumo: a politeness-aware fetch scheduler
///
/// Kumo schedules URL fetches across per-host task pools, respecting
/// crawl delays and per-host concurrency caps, with priority ordering
/// across hosts.
#[derive(Parser, Debug)]
#[command(name = "kumo")]
#[command(version)]
#[command(about = "A politeness-aware fetch scheduler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// File of seed URLs, one per line (lines may end with a priority:
    /// "https://example.com/ 5")
    #[arg(short, long, value_name = "FILE")]
    seeds: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config, show the scheduling parameters, and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let seeds_path = cli
        .seeds
        .ok_or("a seed file is required unless --dry-run is given")?;
    let candidates = load_seeds(&seeds_path)?;
    if candidates.is_empty() {
        tracing::warn!("Seed file {} contained no usable URLs", seeds_path.display());
        return Ok(());
    }

    run_fetch_cycle(config, candidates).await?;
    Ok(())
}

/// Drives one generate/fetch cycle to completion
async fn run_fetch_cycle(
    config: kumo::Config,
    candidates: Vec<Candidate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = Arc::new(TaskMonitor::new(&config.fetch));
    let generator = Generator::from_config(&config.generate);
    let fetcher = Arc::new(HttpFetcher::new(&config.user_agent)?);

    let stats = generator.generate(&monitor, candidates);
    tracing::info!(
        "Batch {}: {} tasks queued across {} pools",
        stats.batch_id,
        stats.generated,
        monitor.pool_count()
    );
    monitor.set_feeder_completed();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();
    for worker_id in 0..config.fetch.workers {
        handles.push(tokio::spawn(run_worker(
            worker_id,
            Arc::clone(&monitor),
            fetcher.clone(),
            shutdown_rx.clone(),
            config.fetch.idle_backoff(),
        )));
    }
    handles.push(tokio::spawn(run_retuner(
        Arc::clone(&monitor),
        shutdown_rx,
        config.fetch.retune_interval(),
    )));

    // Wait until every queued task has finished or been dropped
    while monitor.task_count() > 0 {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    shutdown_tx.send(true)?;
    for handle in handles {
        handle.await?;
    }

    tracing::info!(
        "Fetch cycle complete: {} finished, {} stale completions discarded",
        monitor.finished_task_count(),
        monitor.stale_task_count()
    );
    let report = monitor.cost_report();
    if !report.is_empty() {
        tracing::info!("Top slow hosts:\n{}", report);
    }

    Ok(())
}

/// Parses a seed file into candidates
///
/// Each non-empty, non-comment line holds a URL and an optional integer
/// priority. Seeds score by file position so earlier lines generate first.
fn load_seeds(path: &std::path::Path) -> Result<Vec<Candidate>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let mut candidates = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(raw_url) = parts.next() else {
            continue;
        };
        let priority: i32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

        match Url::parse(raw_url) {
            Ok(url) => {
                let score = -(index as f32);
                candidates.push(Candidate::new(url, score, priority));
            }
            Err(e) => {
                tracing::warn!("Skipping invalid seed URL '{}': {}", raw_url, e);
            }
        }
    }

    Ok(candidates)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kumo=info,warn"),
            1 => EnvFilter::new("kumo=debug,info"),
            2 => EnvFilter::new("kumo=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows scheduling parameters
fn handle_dry_run(config: &kumo::Config) {
    println!("=== Kumo Dry Run ===\n");

    println!("Fetch Scheduling:");
    println!("  Crawl delay: {}ms", config.fetch.crawl_delay_ms);
    println!("  Min crawl delay: {}ms", config.fetch.min_crawl_delay_ms);
    println!("  Pool threads: {}", config.fetch.pool_threads);
    println!("  Pending timeout: {}s", config.fetch.pending_timeout_secs);
    println!("  Workers: {}", config.fetch.workers);
    println!("  Idle backoff: {}ms", config.fetch.idle_backoff_ms);
    println!("  Retune interval: {}s", config.fetch.retune_interval_secs);

    println!("\nGenerate:");
    println!("  Top N per cycle: {}", config.generate.top_n);
    println!("  Max per host: {}", config.generate.max_count_per_host);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\n✓ Configuration is valid");
}
