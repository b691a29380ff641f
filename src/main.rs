//! Static-Mirror main entry point
//!
//! This is the command-line interface for the Static-Mirror single-page
//! offline mirror.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use static_mirror::config::{load_config, Config, MAX_WORKERS};
use static_mirror::output::print_summary;
use static_mirror::rewrite::inject_error_suppression;
use static_mirror::{FsStorage, Mirror, StorageSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Static-Mirror: a single-page offline mirror
///
/// Downloads a web page together with its stylesheets, scripts, images and
/// fonts, and rewrites the page so that it renders from the local copies.
#[derive(Parser, Debug)]
#[command(name = "static-mirror")]
#[command(version)]
#[command(about = "A single-page offline mirror", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror a page into the output directory
    Scrape(ScrapeArgs),
}

#[derive(clap::Args, Debug)]
struct ScrapeArgs {
    /// URL of the page to mirror
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of parallel download workers (1-100)
    #[arg(short, long)]
    workers: Option<u32>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// File name of the mirrored page inside the output directory
    #[arg(long, value_name = "FILE")]
    out: Option<String>,

    /// Keep the previous contents of the output directory
    #[arg(long)]
    no_clean: bool,

    /// Show the effective configuration without downloading anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Scrape(args) => handle_scrape(args).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("static_mirror=info,warn"),
            1 => EnvFilter::new("static_mirror=debug,info"),
            2 => EnvFilter::new("static_mirror=trace,debug"),
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

/// Loads the configuration file (or defaults) and applies CLI overrides
fn resolve_config(args: &ScrapeArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(workers) = args.workers {
        if !(1..=MAX_WORKERS).contains(&workers) {
            bail!("--workers must be between 1 and {}, got {}", MAX_WORKERS, workers);
        }
        config.scraper.workers = workers;
    }
    if let Some(dir) = &args.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(out) = &args.out {
        config.output.document = out.clone();
    }
    if args.no_clean {
        config.output.clean = false;
    }

    static_mirror::config::validate(&config).context("invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: shows what would be done
fn handle_dry_run(url: &str, config: &Config) {
    println!("=== Static-Mirror Dry Run ===\n");

    println!("Page: {}", url);

    println!("\nWorker Pool:");
    println!("  Workers: {}", config.scraper.workers);
    println!("  Max attempts: {}", config.scraper.max_attempts);
    println!("  Retry base delay: {}ms", config.scraper.retry_base_delay_ms);
    println!("  Request timeout: {}s", config.scraper.request_timeout_secs);
    println!("  Queue capacity: {}", config.scraper.effective_queue_capacity());

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Document: {}", config.output.document);
    println!("  Clean first: {}", config.output.clean);
    println!(
        "  Error suppression script: {}",
        config.output.inject_error_suppression
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the main scrape operation
async fn handle_scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;

    if args.dry_run {
        handle_dry_run(&args.url, &config);
        return Ok(());
    }

    let mirror = Mirror::new(&config)?;

    tracing::info!("Fetching {}", args.url);
    let (document, base) = mirror
        .fetch_document(&args.url)
        .await
        .with_context(|| format!("failed to fetch {}", args.url))?;

    // The previous mirror is only touched once the new page is in hand
    let storage = FsStorage::prepare(
        &config.output.directory,
        &config.output.document,
        config.output.clean,
    )
    .with_context(|| format!("failed to prepare {}", config.output.directory))?;
    let storage = Arc::new(storage);

    let output = mirror.localize(&document, &base, storage.clone()).await?;

    let document = if config.output.inject_error_suppression {
        inject_error_suppression(&output.document).into_owned()
    } else {
        output.document
    };

    let path = storage
        .put(&config.output.document, document.as_bytes())
        .context("failed to write the mirrored page")?;

    print_summary(&output.summary);
    println!("\n✓ Page written to: {}", path.display());

    Ok(())
}
