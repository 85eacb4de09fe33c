//! User-triggered immediate recomputes, tracked by an opaque key.

use std::sync::Arc;
use std::time::Duration;

use analytics_core::EntityRef;
use analytics_queue::{Job, JobMeta, JobQueue, RecomputeRequest};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::ReportError;

/// `job_type` tag carried by on-demand jobs.
pub const ON_DEMAND_JOB_TYPE: &str = "custom_analytics_check";

pub fn is_on_demand(job: &Job) -> bool {
    job.meta.job_type.as_deref() == Some(ON_DEMAND_JOB_TYPE)
}

pub struct OnDemandTrigger {
    queue: Arc<dyn JobQueue>,
    result_ttl: Duration,
}

impl OnDemandTrigger {
    pub fn new(queue: Arc<dyn JobQueue>, result_ttl: Duration) -> Self {
        Self { queue, result_ttl }
    }

    /// Enqueue an immediate recompute of `entity` and return its job key.
    ///
    /// The key is random, so on-demand jobs never collide with debounced ones.
    pub async fn trigger_now(
        &self,
        entity: EntityRef,
        requested_by: &str,
    ) -> Result<String, ReportError> {
        let key = Uuid::new_v4().simple().to_string();
        let meta = JobMeta {
            job_type: Some(ON_DEMAND_JOB_TYPE.to_string()),
            requested_by: Some(requested_by.to_string()),
        };

        self.queue
            .enqueue_now(&key, RecomputeRequest { entity }, meta, self.result_ttl)
            .await?;

        info!(entity = %entity, key = %key, requested_by, "on-demand recompute enqueued");
        Ok(key)
    }

    pub async fn fetch_status(&self, key: &str) -> Result<Job, ReportError> {
        self.fetch_status_at(key, Utc::now()).await
    }

    /// Status of an on-demand job while it is retained at `now`.
    ///
    /// Unknown keys, expired results and keys of debounced jobs all read as
    /// not available.
    pub async fn fetch_status_at(&self, key: &str, now: DateTime<Utc>) -> Result<Job, ReportError> {
        match self.queue.fetch(key, now).await? {
            Some(job) if is_on_demand(&job) => Ok(job),
            _ => Err(ReportError::NotAvailable(format!("no on-demand job '{key}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::keys::KEY_PREFIX;
    use analytics_queue::{JobOutcome, JobStatus, MemoryQueue};

    fn trigger() -> (Arc<MemoryQueue>, OnDemandTrigger) {
        let queue = Arc::new(MemoryQueue::default());
        let trigger = OnDemandTrigger::new(queue.clone(), Duration::from_secs(120));
        (queue, trigger)
    }

    #[tokio::test]
    async fn trigger_enqueues_tagged_job() {
        let (_queue, trigger) = trigger();
        let key = trigger.trigger_now(EntityRef::mid(4), "user-7").await.unwrap();

        assert!(!key.starts_with(KEY_PREFIX));
        let job = trigger.fetch_status(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.payload.entity, EntityRef::mid(4));
        assert_eq!(job.meta.requested_by.as_deref(), Some("user-7"));
        assert_eq!(job.result_ttl, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn each_trigger_gets_its_own_key() {
        let (queue, trigger) = trigger();
        let a = trigger.trigger_now(EntityRef::top(1), "u").await.unwrap();
        let b = trigger.trigger_now(EntityRef::top(1), "u").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn debounced_and_unknown_keys_are_not_available() {
        let (queue, trigger) = trigger();
        let key = format!("{KEY_PREFIX}mid-1-initial");
        queue
            .enqueue_at(Utc::now(), &key, RecomputeRequest { entity: EntityRef::mid(1) })
            .await
            .unwrap();

        assert!(matches!(trigger.fetch_status(&key).await, Err(ReportError::NotAvailable(_))));
        assert!(matches!(trigger.fetch_status("missing").await, Err(ReportError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn failed_job_reports_its_error() {
        let (queue, trigger) = trigger();
        let key = trigger.trigger_now(EntityRef::leaf(2), "u").await.unwrap();
        queue.take_due(Utc::now(), 10).await.unwrap();
        queue
            .finish(&key, JobOutcome::Failed("boom".into()), Utc::now())
            .await
            .unwrap();

        let job = trigger.fetch_status(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn status_expiry_follows_the_callers_clock() {
        let (queue, trigger) = trigger();
        let key = trigger.trigger_now(EntityRef::leaf(3), "u").await.unwrap();
        let ended = Utc::now();
        queue.take_due(ended, 10).await.unwrap();
        queue.finish(&key, JobOutcome::Finished, ended).await.unwrap();

        let retained = ended + chrono::Duration::seconds(119);
        let expired = ended + chrono::Duration::seconds(121);
        assert!(trigger.fetch_status_at(&key, retained).await.is_ok());
        assert!(matches!(
            trigger.fetch_status_at(&key, expired).await,
            Err(ReportError::NotAvailable(_))
        ));
    }
}
