//! Comment Harvester main entry point
//!
//! This is the command-line interface for the resumable comment crawler.

use anyhow::{bail, Context};
use clap::Parser;
use comment_harvester::config::{load_config_with_hash, CrawlMode};
use comment_harvester::crawler::{crawl, CrawlStatus};
use comment_harvester::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Comment Harvester: a resumable comment thread crawler
///
/// Harvests every top-level comment of a piece of content together with the
/// replies under it into a single JSON document. Re-running against the same
/// document continues where the previous run stopped.
#[derive(Parser, Debug)]
#[command(name = "comment-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resumable comment thread crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress lines and non-error logging
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start from an empty document, ignoring previous output
    #[arg(long)]
    fresh: bool,

    /// Override the configured scheduling mode (sequential | concurrent)
    #[arg(long, value_name = "MODE")]
    mode: Option<CrawlMode>,

    /// Override the configured content URL
    #[arg(long, value_name = "URL")]
    target: Option<String>,

    /// Validate config and credentials and show the plan without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the comment document and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(mode) = cli.mode {
        config.crawler.mode = mode;
    }
    if let Some(url) = cli.target {
        config.target.url = url;
    }

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, cli.fresh, !cli.quiet).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("comment_harvester=info,warn"),
            1 => EnvFilter::new("comment_harvester=debug,info"),
            2 => EnvFilter::new("comment_harvester=trace,debug"),
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

/// Handles the --dry-run mode: validates inputs and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    use comment_harvester::credentials::{load_credentials, CredentialPool};
    use comment_harvester::state::ResumePoint;
    use comment_harvester::storage::{CommentStore, JsonFileStore};
    use comment_harvester::CrawlTarget;

    println!("=== Comment Harvester Dry Run ===\n");

    let target = CrawlTarget::from_url(&config.target.url)
        .with_context(|| format!("cannot derive a target from {}", config.target.url))?;
    println!("Target:");
    println!("  URL: {}", config.target.url);
    println!("  Id: {}", target);

    println!("\nCrawler Configuration:");
    println!("  Mode: {}", config.crawler.mode);
    println!(
        "  Max concurrent reply streams: {}",
        config.crawler.max_concurrent_replies
    );
    println!(
        "  Page sizes: {} comments, {} replies",
        config.crawler.comment_page_size, config.crawler.reply_page_size
    );
    println!(
        "  Delays: {}ms between comment pages, {}ms between reply pages",
        config.crawler.comment_page_delay_ms, config.crawler.reply_page_delay_ms
    );
    if let Some(max) = config.crawler.max_resume_skip {
        println!("  Resume skip window: {} replies", max);
    }

    println!("\nAPI:");
    println!("  Comments: {}{}", config.api.base_url, config.api.comment_path);
    println!("  Replies: {}{}", config.api.base_url, config.api.reply_path);

    let credentials = load_credentials(&config.credentials.files)
        .context("failed to load credentials")?;
    println!("\nCredentials ({}):", credentials.len());
    for credential in &credentials {
        println!(
            "  - {} ({} cookies)",
            credential.label(),
            credential.cookie_count()
        );
    }
    CredentialPool::new(credentials)?;

    let path = Path::new(&config.output.document_path);
    let store = JsonFileStore::open(path)
        .with_context(|| format!("failed to read document {}", path.display()))?;
    let resume = ResumePoint::resolve(store.comments());
    println!("\nOutput:");
    println!("  Document: {}", path.display());
    println!(
        "  Stored: {} comments, {} replies",
        store.comments().len(),
        store.reply_count()
    );

    println!("\n✓ Configuration is valid");
    match resume.last_comment_id {
        None => println!("✓ Would start crawling from the first comment page"),
        Some(comment) => println!("✓ Would resume after comment {}", comment),
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the comment document
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use comment_harvester::output::{load_statistics, print_statistics};
    use comment_harvester::storage::JsonFileStore;

    let path = Path::new(&config.output.document_path);
    println!("Document: {}\n", path.display());

    let store = JsonFileStore::open(path)
        .with_context(|| format!("failed to read document {}", path.display()))?;
    print_statistics(&load_statistics(&store));

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool, console: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous output)");
    } else {
        tracing::info!("Starting crawl (will resume from the existing document)");
    }
    tracing::info!(
        "Mode: {}, credentials: {}, document: {}",
        config.crawler.mode,
        config.credentials.files.len(),
        config.output.document_path
    );

    let report = crawl(config, fresh, console).await.context("crawl failed")?;
    match report.status {
        CrawlStatus::Completed => {
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        CrawlStatus::Interrupted { reason } => {
            bail!("crawl interrupted; run again to resume: {}", reason)
        }
    }
}
