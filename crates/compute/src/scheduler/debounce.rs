//! Debounced automatic recompute scheduling.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use analytics_core::{EntityRef, EntityStore, ReportStore};
use analytics_queue::{JobQueue, JobStatus, RecomputeRequest};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::keys::{initial_key, latest_pending, regular_key, KeySlot};
use crate::error::ReportError;

/// The job that should represent "the next recompute" of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedJob {
    pub key: String,
    pub run_at: DateTime<Utc>,
}

/// Result of one [`DebounceScheduler::schedule_autoupdate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRecompute {
    pub entity: EntityRef,
    pub key: String,
    pub run_at: DateTime<Utc>,
    /// Whether this call inserted the job (false when it was already queued).
    pub enqueued: bool,
}

/// Choose the key of the next recompute of `entity`.
///
/// `last_run` is the `created_date` of the entity's report or, while its first
/// recompute is still running, that job's scheduled time.
///
/// - Never run: the entity's `initial` key, runnable at `now`.
/// - A pending job of this entity is still in the future: reuse it.
/// - Otherwise: the first `last_run + k * delay` boundary strictly after `now`.
pub fn plan_next_job(
    entity: EntityRef,
    pending: &HashSet<String>,
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    delay: Duration,
) -> PlannedJob {
    let Some(last) = last_run else {
        return PlannedJob { key: initial_key(entity), run_at: now };
    };

    if let Some((key, KeySlot::At(at))) = latest_pending(entity, pending) {
        if at > now {
            return PlannedJob { key: key.to_string(), run_at: at };
        }
    }

    let delay_ms = delay_millis(delay);
    let last_ms = last.timestamp_millis();
    let elapsed = now.timestamp_millis() - last_ms;
    let intervals = (1 + elapsed.div_euclid(delay_ms)).max(1);
    let run_at_ms = last_ms.saturating_add(delay_ms.saturating_mul(intervals));
    let run_at = DateTime::<Utc>::from_timestamp_millis(run_at_ms)
        .unwrap_or_else(|| now + chrono::Duration::milliseconds(delay_ms));

    PlannedJob { key: regular_key(entity, run_at), run_at }
}

fn delay_millis(delay: Duration) -> i64 {
    i64::try_from(delay.as_millis()).unwrap_or(i64::MAX).max(1)
}

/// Keeps at most one automatic recompute pending per entity and time window.
///
/// Holds no lock: concurrent callers derive the same key from (entity, slot)
/// and the queue ignores the second insert.
pub struct DebounceScheduler {
    queue: Arc<dyn JobQueue>,
    reports: Arc<dyn ReportStore>,
    entities: Arc<dyn EntityStore>,
    delay: Duration,
}

impl DebounceScheduler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        reports: Arc<dyn ReportStore>,
        entities: Arc<dyn EntityStore>,
        delay: Duration,
    ) -> Self {
        Self { queue, reports, entities, delay }
    }

    /// Ensure one future recompute job is pending for `entity`.
    pub async fn schedule_autoupdate(
        &self,
        entity: EntityRef,
        now: DateTime<Utc>,
    ) -> Result<ScheduledRecompute, ReportError> {
        let window_end = now + chrono::Duration::milliseconds(delay_millis(self.delay));
        let pending = self.queue.list_pending(window_end).await?;
        let last_run = match self.reports.get(entity).await? {
            Some(report) => Some(report.created_date),
            None => self.first_run_in_flight(entity, now).await?,
        };

        let planned = plan_next_job(entity, &pending, last_run, now, self.delay);

        let enqueued = if pending.contains(&planned.key) {
            debug!(entity = %entity, key = %planned.key, "recompute already pending");
            false
        } else {
            let request = RecomputeRequest { entity };
            self.queue
                .enqueue_at(planned.run_at, &planned.key, request)
                .await?
        };

        if enqueued {
            info!(
                entity = %entity,
                key = %planned.key,
                run_at = %planned.run_at,
                "recompute scheduled"
            );
        }

        Ok(ScheduledRecompute {
            entity,
            key: planned.key,
            run_at: planned.run_at,
            enqueued,
        })
    }

    /// Scheduled time of the entity's `initial` job while a worker runs it.
    ///
    /// The running job still holds the `initial` key and its report does not
    /// exist yet, so a mutation arriving now is bucketed from that job instead.
    async fn first_run_in_flight(
        &self,
        entity: EntityRef,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ReportError> {
        let job = self.queue.fetch(&initial_key(entity), now).await?;
        Ok(job
            .filter(|j| j.status == JobStatus::Started)
            .map(|j| j.scheduled_at))
    }

    /// Schedule the root container of a mutated entity.
    ///
    /// One recompute of the root refreshes every stale report beneath it.
    pub async fn schedule_for_mutation(
        &self,
        entity: EntityRef,
        now: DateTime<Utc>,
    ) -> Result<ScheduledRecompute, ReportError> {
        let root = self.entities.root_of(entity).await?;
        debug!(entity = %entity, root = %root, "mutation resolved to root");
        self.schedule_autoupdate(root, now).await
    }
}
