//! Vespers main entry point
//!
//! This is the command-line interface for the Vespers church directory crawler.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vespers::config::{load_config_with_hash, Config};
use vespers::crawler::{CrawlResult, Engine};
use vespers::output::{print_sessions, print_statistics, StatisticsAggregator, StatsFilter};
use vespers::storage::{ChurchFilter, SqliteStorage, Storage};
use vespers::SessionStatus;

/// Vespers: a church directory crawler
///
/// Vespers crawls parish directories, reconciles what it finds against the
/// churches it already knows, and keeps an audit trail of every session.
#[derive(Parser, Debug)]
#[command(name = "vespers")]
#[command(version)]
#[command(about = "A church directory crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one crawl session
    Run {
        /// Classify and count everything but write nothing to the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration and list the sources that would be crawled
    Check,

    /// Show directory statistics
    Stats {
        #[arg(long)]
        jurisdiction: Option<String>,

        #[arg(long)]
        state: Option<String>,
    },

    /// Show session history
    Sessions {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Search the directory
    Search {
        /// Free text matched against name, city, address, clergy and keywords
        text: Option<String>,

        #[arg(long)]
        jurisdiction: Option<String>,

        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    setup_logging(cli.verbose, cli.quiet, &config.engine.log_level);
    tracing::info!(path = %cli.config.display(), hash = %config_hash, "Configuration loaded");

    match cli.command {
        Command::Run { dry_run } => handle_run(config, config_hash, dry_run).await,
        Command::Check => handle_check(config, config_hash),
        Command::Stats {
            jurisdiction,
            state,
        } => handle_stats(&config, StatsFilter { jurisdiction, state }),
        Command::Sessions { limit } => handle_sessions(&config, limit),
        Command::Search {
            text,
            jurisdiction,
            state,
            city,
            limit,
        } => handle_search(
            &config,
            ChurchFilter {
                jurisdiction,
                state,
                city,
                text,
                limit: Some(limit),
            },
        ),
    }
}

/// Sets up the logging/tracing subscriber
///
/// Verbosity flags win; otherwise the configured log level applies to this
/// crate, falling back to `RUST_LOG` when it cannot be parsed.
fn setup_logging(verbose: u8, quiet: bool, log_level: &str) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_new(format!("vespers={},warn", log_level.trim()))
                .unwrap_or_else(|_| EnvFilter::from_default_env()),
            1 => EnvFilter::new("vespers=debug,info"),
            2 => EnvFilter::new("vespers=trace,debug"),
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

/// Runs one crawl session and prints its summary
async fn handle_run(mut config: Config, config_hash: String, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        config.engine.save_to_database = false;
    }

    let engine = Engine::new(config, config_hash).context("Failed to build engine")?;

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing running sources");
            cancel.cancel();
        }
    });

    let result = engine.run().await?;
    print_result(&result);

    if result.status == SessionStatus::Failed {
        bail!(
            "session {} failed: {}",
            result.session_id,
            result.fatal_error.as_deref().unwrap_or("no source succeeded")
        );
    }
    Ok(())
}

fn print_result(result: &CrawlResult) {
    println!("=== Vespers Session {} ===\n", result.session_id);
    if result.dry_run {
        println!("Dry run: nothing was saved\n");
    }

    let totals = &result.totals;
    println!("Status:    {}", result.status);
    println!("Duration:  {} ms", result.duration_ms);
    println!("Found:     {}", totals.found);
    println!("New:       {}", totals.new);
    println!("Duplicate: {}", totals.duplicate);
    println!("Updated:   {}", totals.updated);
    println!("Errors:    {}", totals.errors);

    if !result.tasks.is_empty() {
        println!("\nSources:");
        for task in &result.tasks {
            print!(
                "  {} ({}): {} after {} attempt(s), {} candidate(s)",
                task.source_id, task.jurisdiction, task.status, task.attempts, task.candidates
            );
            match &task.error {
                Some(error) => println!(" - {}", error),
                None => println!(),
            }
        }
    }

    if let Some(path) = &result.report_path {
        println!("\nReport: {}", path.display());
    }
}

/// Validates the configuration and lists the sources
fn handle_check(config: Config, config_hash: String) -> anyhow::Result<()> {
    println!("=== Vespers Configuration Check ===\n");

    println!("Engine:");
    println!("  Max concurrent scrapers: {}", config.engine.max_concurrent_scrapers);
    println!("  Validate URLs: {}", config.engine.validate_urls);
    println!("  Live-check URLs: {}", config.engine.live_check_urls);
    println!("  Duplicate detection: {}", config.engine.enable_duplicate_detection);
    println!("  Save to database: {}", config.engine.save_to_database);
    println!("  Output directory: {}", config.engine.output_dir);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Base delay: {}ms", config.retry.base_delay_ms);
    println!("  Task timeout: {}s", config.retry.task_timeout_secs);

    println!("\nDatabase: {}", config.database.path);

    let engine = Engine::new(config, config_hash).context("Failed to build sources")?;
    println!("\nSources ({}):", engine.registry().len());
    for source in engine.registry().iter() {
        println!("  - {} [{}]", source.id(), source.jurisdiction());
        for url in source.urls() {
            println!("    * {}", url);
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

fn busy_timeout(config: &Config) -> Duration {
    Duration::from_millis(config.database.busy_timeout_ms)
}

fn handle_stats(config: &Config, filter: StatsFilter) -> anyhow::Result<()> {
    println!("Database: {}\n", config.database.path);

    let stats = StatisticsAggregator::new(&config.database.path, busy_timeout(config))
        .summarize(&filter)
        .context("Failed to compute statistics")?;
    print_statistics(&stats);
    Ok(())
}

fn handle_sessions(config: &Config, limit: usize) -> anyhow::Result<()> {
    let storage = SqliteStorage::open_read_only(Path::new(&config.database.path), busy_timeout(config))?;
    print_sessions(&storage.list_sessions(limit)?);
    Ok(())
}

fn handle_search(config: &Config, filter: ChurchFilter) -> anyhow::Result<()> {
    let storage = SqliteStorage::open_read_only(Path::new(&config.database.path), busy_timeout(config))?;
    let churches = storage.search_churches(&filter)?;

    if churches.is_empty() {
        println!("No churches found.");
        return Ok(());
    }

    for church in &churches {
        let locality = [church.city.as_deref(), church.state.as_deref(), church.zip_code.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        println!("{} ({})", church.name, church.jurisdiction);
        if let Some(address) = &church.address {
            println!("  {}", address);
        }
        if !locality.is_empty() {
            println!("  {}", locality);
        }
        for value in [&church.clergy_contact, &church.contact_phone, &church.contact_email, &church.website]
            .into_iter()
            .flatten()
        {
            println!("  {}", value);
        }
    }
    println!("\n{} church(es)", churches.len());
    Ok(())
}
