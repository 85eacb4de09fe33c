//! Queue-draining worker that turns recompute jobs into fresh reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use analytics_queue::{JobOutcome, JobQueue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::engine::RecomputeEngine;
use crate::error::ReportError;
use crate::scheduler::is_on_demand;

/// What one [`ReportWorker::run_once`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerTick {
    pub processed: usize,
    pub failed: usize,
    pub purged: usize,
}

/// Cumulative worker counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerMetrics {
    pub ticks: u64,
    pub jobs_finished: u64,
    pub jobs_failed: u64,
    pub on_demand_jobs: u64,
    pub last_tick: Option<DateTime<Utc>>,
    /// Mean wall time of a job, in milliseconds.
    pub avg_job_ms: f64,
}

impl WorkerMetrics {
    fn record_job(&mut self, elapsed: Duration, ok: bool, on_demand: bool) {
        if ok {
            self.jobs_finished += 1;
        } else {
            self.jobs_failed += 1;
        }
        if on_demand {
            self.on_demand_jobs += 1;
        }
        let count = (self.jobs_finished + self.jobs_failed) as f64;
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.avg_job_ms += (ms - self.avg_job_ms) / count;
    }
}

pub struct ReportWorker {
    queue: Arc<dyn JobQueue>,
    engine: Arc<RecomputeEngine>,
    batch_size: usize,
    metrics: Arc<RwLock<WorkerMetrics>>,
    shutdown: Arc<AtomicBool>,
}

impl ReportWorker {
    pub fn new(queue: Arc<dyn JobQueue>, engine: Arc<RecomputeEngine>, batch_size: usize) -> Self {
        Self {
            queue,
            engine,
            batch_size: batch_size.max(1),
            metrics: Arc::new(RwLock::new(WorkerMetrics::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn metrics(&self) -> WorkerMetrics {
        self.metrics
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Signal [`run`](Self::run) to stop after the current tick.
    pub fn shutdown(&self) {
        info!("report worker shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Claim every job due at `now` (up to the batch size) and run it.
    ///
    /// A failing job is marked failed and does not stop the batch. Once jobs
    /// are claimed, every one of them is run and finished even if recording an
    /// earlier outcome failed; only purge and claim errors abort the tick.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<WorkerTick, ReportError> {
        let mut tick = WorkerTick {
            purged: self.queue.purge_expired(now).await?,
            ..WorkerTick::default()
        };

        let jobs = self.queue.take_due(now, self.batch_size).await?;
        if jobs.is_empty() {
            debug!("no due recompute jobs");
        }

        for job in jobs {
            let entity = job.payload.entity;
            let on_demand = is_on_demand(&job);
            let start = Instant::now();

            let outcome = match self.engine.ensure_fresh_at(entity, Utc::now()).await {
                Ok(_) => JobOutcome::Finished,
                Err(e) => {
                    warn!(key = %job.key, entity = %entity, error = %e, "recompute job failed");
                    JobOutcome::Failed(e.to_string())
                }
            };
            let mut ok = outcome == JobOutcome::Finished;

            if let Err(e) = self.queue.finish(&job.key, outcome, Utc::now()).await {
                error!(
                    key = %job.key,
                    entity = %entity,
                    error = %e,
                    "failed to record job outcome"
                );
                ok = false;
            }
            tick.processed += 1;
            if !ok {
                tick.failed += 1;
            }

            if let Ok(mut m) = self.metrics.write() {
                m.record_job(start.elapsed(), ok, on_demand);
            }
        }

        if let Ok(mut m) = self.metrics.write() {
            m.ticks += 1;
            m.last_tick = Some(now);
        }

        if tick.processed > 0 {
            info!(
                processed = tick.processed,
                failed = tick.failed,
                purged = tick.purged,
                "worker tick complete"
            );
        }
        Ok(tick)
    }

    /// Poll the queue every `poll_interval` until shutdown is signaled.
    pub async fn run(&self, poll_interval: Duration) {
        info!(
            batch_size = self.batch_size,
            poll_ms = poll_interval.as_millis() as u64,
            "report worker starting"
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.run_once(Utc::now()).await {
                error!(error = %e, "worker tick failed");
            }
            tokio::time::sleep(poll_interval).await;
        }

        info!("report worker stopped");
    }
}
