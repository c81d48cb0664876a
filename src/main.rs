//! Admin-Crawler main entry point
//!
//! This is the command-line interface for the bounded government-domain crawler.

use admin_crawler::config::{load_config_with_hash, validate, Config};
use admin_crawler::crawler::{build_http_client, CrawlEngine, HttpFetcher, RetryPolicy};
use admin_crawler::legal::{CatalogCrawler, Escalator, Renderer, SparqlCitationSource};
use admin_crawler::output::{load_statistics, print_statistics, OutputLayout};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Admin-Crawler: crawls Swiss federal administration websites
///
/// Resources are sorted into storage buckets, script-gated legal pages are
/// resolved to their XML documents, and the link graph is checkpointed so an
/// interrupted crawl resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "admin-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A bounded crawler for government web domains", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used without one)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Start URL, replaces the configured ones (repeatable)
    #[arg(long = "start-url", value_name = "URL")]
    start_urls: Vec<String>,

    /// Directory for crawled resources and checkpoints
    #[arg(long, value_name = "DIR")]
    write_dir: Option<String>,

    /// Do not write fetched resources to disk (checkpoints are still written)
    #[arg(long)]
    no_write: bool,

    /// Regular expression a link must match to be followed
    #[arg(long, value_name = "REGEX", conflicts_with = "no_filter")]
    filter_pattern: Option<String>,

    /// Follow every extracted link
    #[arg(long)]
    no_filter: bool,

    /// Number of URLs processed concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, ignoring an existing checkpoint
    #[arg(long)]
    fresh: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with_all = ["catalog", "fresh"])]
    stats: bool,

    /// Enrich the legal catalog instead of crawling
    #[arg(long)]
    catalog: bool,

    /// Skip catalog records with an index below this value
    #[arg(long, default_value_t = 0, requires = "catalog")]
    catalog_offset: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration")?;

    if cli.stats {
        handle_stats(&config)
    } else if cli.catalog {
        handle_catalog(&config, cli.catalog_offset).await
    } else {
        handle_crawl(&config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("admin_crawler=info,warn"),
            1 => EnvFilter::new("admin_crawler=debug,info"),
            2 => EnvFilter::new("admin_crawler=trace,debug"),
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

/// Applies command-line flags on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if !cli.start_urls.is_empty() {
        config.crawler.start_urls = cli.start_urls.clone();
    }
    if let Some(dir) = &cli.write_dir {
        config.output.write_dir = dir.clone();
    }
    if cli.no_write {
        config.output.write = false;
    }
    if let Some(pattern) = &cli.filter_pattern {
        config.filter.enabled = true;
        config.filter.pattern = pattern.clone();
    }
    if cli.no_filter {
        config.filter.enabled = false;
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
}

/// Builds the renderer for gated pages
fn build_renderer(config: &Config) -> Arc<dyn Renderer> {
    #[cfg(feature = "browser")]
    {
        let settle = Duration::from_secs(config.crawler.render_timeout_secs) / 2;
        Arc::new(admin_crawler::legal::ChromeRenderer::new(settle))
    }

    #[cfg(not(feature = "browser"))]
    {
        let _ = config;
        tracing::warn!("Built without the `browser` feature, gated pages are stored unresolved");
        Arc::new(admin_crawler::legal::UnavailableRenderer)
    }
}

fn build_escalator(config: &Config) -> Escalator {
    Escalator::new(
        build_renderer(config),
        Duration::from_secs(config.crawler.render_timeout_secs),
    )
}

/// Handles the --stats mode: prints statistics of the last checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = OutputLayout::new(&config.output.write_dir).checkpoint_path();

    match load_statistics(&path)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No checkpoint found at {}", path.display()),
    }
    Ok(())
}

/// Handles the --catalog mode: enriches the legal catalog
async fn handle_catalog(config: &Config, offset: usize) -> anyhow::Result<()> {
    let client = build_http_client(&config.crawler)?;
    let endpoint = Url::parse(&config.legal.sparql_endpoint)?;

    let layout = OutputLayout::new(&config.output.write_dir);
    if config.output.write {
        layout.ensure()?;
    }

    let mut crawler = CatalogCrawler::new(
        Arc::new(SparqlCitationSource::new(client.clone(), endpoint)),
        build_escalator(config),
        Arc::new(HttpFetcher::from_client(client)),
        layout,
    )
    .with_retry(RetryPolicy::from_config(&config.crawler))
    .with_write(config.output.write)
    .with_snapshot_interval(config.legal.catalog_checkpoint_interval);

    let report = crawler.run(offset).await?;

    println!("\n=== Catalog Complete ===");
    println!("Listed: {}", report.listed);
    println!("Stored: {}", report.stored);
    println!("Failed: {}", report.failed);
    println!("Skipped by offset: {}", report.skipped_by_offset);
    Ok(())
}

/// Handles the normal crawl mode
async fn handle_crawl(config: &Config, fresh: bool) -> anyhow::Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);
    let mut engine = CrawlEngine::new(config, fetcher, build_escalator(config))?;
    engine.restore_or_seed(fresh)?;

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::warn!("Received Ctrl-C, stopping after a final checkpoint"),
            Err(e) => {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    let report = engine.run_until(shutdown).await?;

    println!("\n=== Crawl {} ===", if report.interrupted { "Interrupted" } else { "Complete" });
    println!("Completed: {}", report.completed);
    println!("Skipped: {}", report.skipped);
    println!("Escalated: {}", report.escalated);
    println!("Legal documents: {}", report.legal_documents);
    println!("Links enqueued: {}", report.links_enqueued);
    println!("Checkpoints: {}", report.checkpoints);
    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());

    if report.interrupted {
        anyhow::bail!("crawl interrupted, run again without --fresh to resume");
    }
    Ok(())
}
