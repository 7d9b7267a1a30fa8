//! Operational CLI for the feedpool scheduler.
//!
//! `run` drives the scheduler over fixture-backed feeds; `show` prints a
//! summary of the persisted snapshot and statistics.

mod fixtures;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feedpool::{
    CategoryDescriptor, CycleStats, DefaultResolver, Scheduler, SchedulerConfig, SnapshotFile,
    SnapshotWriter,
};
use fixtures::FixtureSource;

#[derive(Parser)]
#[command(name = "feedpool", about = "Session-pooled live feed monitor", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the extraction scheduler
    Run(RunArgs),
    /// Print a summary of the persisted snapshot and statistics
    Show(ShowArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Directory of per-category fixture files (<category>.json)
    #[arg(long, default_value = "fixtures")]
    fixtures: PathBuf,

    /// Directory for snapshot, history and stats files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Milliseconds between extraction cycles
    #[arg(long, default_value_t = 2000)]
    tick_interval_ms: u64,

    /// Seconds between maintenance passes (cleanup runs at twice this)
    #[arg(long, default_value_t = 60)]
    recheck_interval_secs: u64,

    /// Empty checks before an idle session's handle is released
    #[arg(long, default_value_t = 10)]
    cleanup_threshold: u32,

    /// Seconds a redirected session cools down before reopening
    #[arg(long, default_value_t = 1800)]
    redirect_cooldown_secs: u64,

    /// Poll only these categories (repeatable; default: every fixture found)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Run exactly one cycle, print its stats, and exit
    #[arg(long)]
    single_cycle: bool,

    /// Seed the store from the last persisted snapshot before the first tick
    #[arg(long)]
    resume: bool,
}

#[derive(Args)]
struct ShowArgs {
    /// Directory holding snapshot, history and stats files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Show(args) => show(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let categories = discover_categories(&args)?;
    if categories.is_empty() {
        bail!(
            "no fixture files found under {} (expected <category>.json)",
            args.fixtures.display()
        );
    }

    let config = SchedulerConfig::new()
        .with_tick_interval(Duration::from_millis(args.tick_interval_ms))
        .with_recheck_interval(Duration::from_secs(args.recheck_interval_secs))
        .with_cleanup_threshold(args.cleanup_threshold)
        .with_redirect_cooldown(Duration::from_secs(args.redirect_cooldown_secs));

    let mut scheduler = Scheduler::initialize(
        FixtureSource::new(),
        DefaultResolver::new(),
        &categories,
        config,
        SnapshotWriter::new(&args.data_dir),
    )
    .await
    .context("scheduler initialization failed")?;

    if args.resume {
        scheduler
            .resume()
            .await
            .context("failed to resume from persisted snapshot")?;
    }

    if args.single_cycle {
        let stats = scheduler.run_once().await;
        scheduler.shutdown().await?;
        print_stats(&stats);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("termination signal received");
            canceller.cancel();
        }
    });

    scheduler.run(cancel).await.context("scheduler loop failed")?;
    Ok(())
}

/// List categories from the fixture directory, optionally filtered to the
/// requested subset.
fn discover_categories(args: &RunArgs) -> Result<Vec<CategoryDescriptor>> {
    let entries = std::fs::read_dir(&args.fixtures)
        .with_context(|| format!("cannot read fixture directory {}", args.fixtures.display()))?;

    let mut categories = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !args.categories.is_empty() && !args.categories.iter().any(|c| c == stem) {
            continue;
        }
        categories.push(CategoryDescriptor::new(stem, path.to_string_lossy()));
    }

    categories.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(categories)
}

async fn show(args: ShowArgs) -> Result<()> {
    let writer = SnapshotWriter::new(&args.data_dir);

    let Some(snapshot) = writer.load_snapshot().await? else {
        bail!("no snapshot found under {}", args.data_dir.display());
    };
    print_snapshot(&snapshot);

    if let Some(stats) = writer.load_stats().await? {
        print_stats(&stats);
    }

    Ok(())
}

fn print_snapshot(snapshot: &SnapshotFile) {
    println!("snapshot taken {}", snapshot.timestamp.to_rfc3339());
    println!("  records: {}", snapshot.total_records);
    for (category, count) in &snapshot.per_category_counts {
        println!("    {category}: {count}");
    }
    for record in &snapshot.records {
        println!(
            "  [{}] {} vs {} ({}) {}-{}, {} markets",
            record.category,
            record.payload.home_team,
            record.payload.away_team,
            if record.payload.league.is_empty() {
                "?"
            } else {
                record.payload.league.as_str()
            },
            record.payload.score.home,
            record.payload.score.away,
            record.payload.markets.len(),
        );
    }
}

fn print_stats(stats: &CycleStats) {
    println!("last cycle {}", stats.timestamp.to_rfc3339());
    println!(
        "  {} ms, {}/{} sessions active",
        stats.tick_duration_ms, stats.sessions_active, stats.sessions_total
    );
    println!(
        "  +{} inserted, ~{} updated, -{} removed, {} total",
        stats.inserted, stats.updated, stats.removed, stats.records_total
    );
}
