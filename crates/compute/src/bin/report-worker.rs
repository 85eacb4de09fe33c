//! report-worker: compute analytics reports for an entity tree.
//!
//! Loads a tree fixture, schedules one recompute per root container, drains
//! the queue and prints every root report as JSON. With `--follow` it keeps
//! polling the queue until Ctrl-C.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use analytics_compute::{DebounceScheduler, MetricSet, RecomputeEngine, ReportWorker};
use analytics_core::config::load_dotenv;
use analytics_core::{Config, MemoryEntityStore, MemoryReportStore, ReportStore, TreeFixture};
use analytics_queue::MemoryQueue;

// ── CLI ─────────────────────────────────────────────────────────────

/// Analytics report worker: debounced, staleness-checked recomputation.
#[derive(Parser, Debug)]
#[command(name = "report-worker", version, about)]
struct Cli {
    /// Path to the entity tree fixture (JSON with `tops`, `mids`, `leaves`).
    #[arg(long, env = "ANALYTICS_FIXTURE", default_value = "demos/tree.json")]
    fixture: PathBuf,

    /// Debounce window in seconds (overrides ANALYTICS_CHECK_JOB_DELAY).
    #[arg(long)]
    check_delay: Option<u64>,

    /// Queue poll interval in milliseconds (overrides ANALYTICS_WORKER_POLL_MS).
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Metric evaluation threads (overrides ANALYTICS_WORKER_THREADS).
    #[arg(long)]
    threads: Option<usize>,

    /// Keep polling the queue after the initial drain.
    #[arg(long)]
    follow: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(secs) = cli.check_delay {
        config.schedule.check_delay_secs = secs;
    }
    if let Some(ms) = cli.poll_ms {
        config.worker.poll_interval_ms = ms;
    }
    if let Some(threads) = cli.threads {
        config.worker.worker_threads = threads;
    }
    config.log_summary();

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker.resolved_worker_threads())
        .build_global()
    {
        warn!(error = %e, "rayon global pool already initialised");
    }

    let fixture = TreeFixture::from_file(&cli.fixture)
        .with_context(|| format!("failed to load fixture {}", cli.fixture.display()))?;
    let roots = fixture.roots();
    info!(
        path = %cli.fixture.display(),
        tops = fixture.tops.len(),
        mids = fixture.mids.len(),
        leaves = fixture.leaves.len(),
        "loaded entity tree"
    );

    let entities = Arc::new(MemoryEntityStore::from_fixture(fixture)?);
    let reports = Arc::new(MemoryReportStore::new());
    let queue = Arc::new(MemoryQueue::new(config.schedule.job_result_ttl()));

    let engine = Arc::new(RecomputeEngine::new(
        entities.clone(),
        reports.clone(),
        Arc::new(MetricSet::standard()),
    ));
    let scheduler = DebounceScheduler::new(
        queue.clone(),
        reports.clone(),
        entities.clone(),
        config.schedule.check_delay(),
    );
    let worker = ReportWorker::new(queue.clone(), engine, config.worker.batch_size);

    for root in &roots {
        scheduler.schedule_autoupdate(*root, Utc::now()).await?;
    }

    loop {
        let tick = worker.run_once(Utc::now()).await?;
        if tick.processed == 0 {
            break;
        }
    }

    for root in &roots {
        match reports.get(*root).await? {
            Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            None => warn!(entity = %root, "no report produced"),
        }
    }

    let metrics = worker.metrics();
    info!(
        finished = metrics.jobs_finished,
        failed = metrics.jobs_failed,
        avg_job_ms = metrics.avg_job_ms,
        "initial drain complete"
    );

    if cli.follow {
        let signal = worker.shutdown_signal();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl-C");
                signal.store(true, Ordering::Relaxed);
            }
        });
        worker.run(config.worker.poll_interval()).await;
    }

    Ok(())
}
