//! osrc archive ingester.
//!
//! Pulls hourly activity-archive shards for a range of days (or reads local
//! shard files) and stores every new event with its actor and repository.
//!
//! # Usage
//!
//! ```bash
//! # Yesterday's 24 shards (UTC)
//! osrc-ingest
//!
//! # A range of days; --until is exclusive
//! osrc-ingest --since 2015-01-01 --until 2015-01-08
//!
//! # Local shard files, in the order given
//! osrc-ingest ./2015-01-01-15.json.gz ./2015-01-01-16.json.gz
//!
//! # Custom config, with metrics
//! osrc-ingest -c /etc/osrc/osrc.toml --metrics-port 9091
//! ```
//!
//! # Stopping
//!
//! Ctrl+C ends the run after the shard in progress has been committed.
//! Re-running the same range later picks up where it stopped, since events
//! that are already stored are skipped.

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use clap::Parser;
use osrc_core::metrics::{init_metrics, start_metrics_server};
use osrc_ingest::{
    Config, EventStore, IngestDriver, RunStats, ShardOpener, ShardPlan, SqliteResolver,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// osrc archive ingester.
#[derive(Parser, Debug)]
#[command(name = "osrc-ingest")]
#[command(about = "Ingest hourly activity-archive shards into the osrc event store")]
#[command(version)]
struct Args {
    /// Local shard files to ingest, in order (skips downloading)
    #[arg(conflicts_with_all = ["since", "until"])]
    files: Vec<PathBuf>,

    /// First day to ingest, YYYY-MM-DD [default: yesterday, UTC]
    #[arg(short, long, value_parser = parse_date)]
    since: Option<NaiveDate>,

    /// Day to stop before, YYYY-MM-DD [default: today, UTC]
    #[arg(long, value_parser = parse_date)]
    until: Option<NaiveDate>,

    /// Configuration file
    #[arg(short, long, default_value = "./osrc.toml")]
    config: PathBuf,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("osrc_ingest=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.metrics_port > 0 {
        let metrics_handle = init_metrics().context("Failed to install metrics recorder")?;
        start_metrics_server(args.metrics_port, metrics_handle)
            .await
            .context("Failed to start metrics server")?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("Stop requested, finishing the current shard...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let plan = build_plan(&args, Utc::now().date_naive());
    log_plan(&plan);

    let start = Instant::now();
    let summary_config = config.clone();
    let (stats, outcome) = tokio::task::spawn_blocking(move || {
        let mut stats = RunStats::default();
        let outcome = ingest(&config, plan, running, &mut stats);
        (stats, outcome)
    })
    .await
    .context("Ingestion task panicked")?;

    print_summary(&summary_config, &stats, start.elapsed());

    outcome
}

/// Open the store and run every shard of `plan`.
fn ingest(
    config: &Config,
    plan: ShardPlan,
    running: Arc<AtomicBool>,
    stats: &mut RunStats,
) -> Result<()> {
    let store = EventStore::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open event store at {}",
            config.database_path.display()
        )
    })?;
    let opener = ShardOpener::new(config.fetch.clone())?;
    let resolver = SqliteResolver;

    let driver = IngestDriver::new(&store, &resolver, &opener)
        .continue_on_error(config.continue_on_error)
        .with_running_flag(running);

    driver
        .run(plan.shards(&config.archive_url), stats)
        .context("Ingestion stopped")
}

/// Explicit files win; otherwise `[since, until)` with yesterday/today defaults.
fn build_plan(args: &Args, today: NaiveDate) -> ShardPlan {
    if !args.files.is_empty() {
        return ShardPlan::Files(args.files.clone());
    }

    let until = args.until.unwrap_or(today);
    let since = args
        .since
        .unwrap_or_else(|| today.checked_sub_days(Days::new(1)).unwrap_or(today));
    ShardPlan::Range { since, until }
}

fn log_plan(plan: &ShardPlan) {
    match plan {
        ShardPlan::Files(files) => {
            tracing::info!("Ingesting {} local shard file(s)", files.len());
        }
        ShardPlan::Range { since, until } if since >= until => {
            tracing::warn!("Empty date range {} .. {}, nothing to ingest", since, until);
        }
        ShardPlan::Range { since, until } => {
            tracing::info!(
                "Ingesting {} .. {} ({} shards)",
                since,
                until,
                (*until - *since).num_days() * osrc_core::SHARDS_PER_DAY as i64
            );
        }
    }
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn print_summary(config: &Config, stats: &RunStats, elapsed: Duration) {
    for line in summary_lines(config, stats, elapsed) {
        println!("{}", line);
    }
}

fn summary_lines(config: &Config, stats: &RunStats, elapsed: Duration) -> Vec<String> {
    const RULE: &str = "══════════════════════════════════════════════════════════════════";

    let mut lines = vec![
        String::new(),
        RULE.to_string(),
        "SUMMARY".to_string(),
        RULE.to_string(),
        String::new(),
        format!("Store:       {}", config.database_path.display()),
        format!("Archive:     {}", config.archive_url),
        String::new(),
        format!("Shards processed:  {:>12}", stats.shards_processed),
    ];
    if stats.shards_failed > 0 {
        lines.push(format!("Shards failed:     {:>12}", stats.shards_failed));
    }
    lines.push(format!("Total records:     {:>12}", stats.records));
    lines.push(format!("New events:        {:>12}", stats.inserted));
    lines.push(format!("Duplicate events:  {:>12}", stats.duplicates));
    lines.push(format!("Invalid records:   {:>12}", stats.invalid()));
    if stats.invalid() > 0 {
        lines.push(format!("  - Malformed:       {:>10}", stats.malformed));
        lines.push(format!("  - Unresolved:      {:>10}", stats.unresolved));
    }
    lines.push(format!("Enrichments:       {:>12}", stats.enriched));
    if stats.enrichment_missing > 0 {
        lines.push(format!(
            "  - Missing payload: {:>10}",
            stats.enrichment_missing
        ));
    }
    lines.push(format!(
        "Bytes read:        {:>12} ({:.1} MB)",
        stats.bytes,
        stats.bytes as f64 / 1_048_576.0
    ));
    if stats.stopped {
        lines.push(String::new());
        lines.push("Stopped early on request.".to_string());
    }

    lines.push(String::new());
    lines.push(format!("Elapsed:           {:>12.2?}", elapsed));
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        lines.push(format!(
            "Throughput:        {:>12.0} records/sec",
            stats.records as f64 / secs
        ));
    }
    lines.push(RULE.to_string());
    lines
}
