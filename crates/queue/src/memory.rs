//! In-process job queue backed by a key -> job map.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::QueueError;
use crate::job::{Job, JobMeta, JobOutcome, JobStatus, RecomputeRequest};
use crate::queue::JobQueue;

/// Job queue held in memory.
///
/// Suitable for a single worker process and for tests; every operation is a
/// short critical section over one map, which makes key lookup + insert atomic.
pub struct MemoryQueue {
    jobs: Mutex<HashMap<String, Job>>,
    /// Retention applied to jobs enqueued with `enqueue_at`.
    default_result_ttl: Duration,
}

impl MemoryQueue {
    pub fn new(default_result_ttl: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            default_result_ttl,
        }
    }

    /// Number of jobs currently held, including retained results.
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Snapshot of every held job, ordered by scheduled time.
    pub async fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then_with(|| a.key.cmp(&b.key)));
        jobs
    }

    /// Insert unless a live job holds the key. Finished and failed jobs only
    /// keep their result around; a new job under the same key replaces them.
    async fn insert(&self, job: Job) -> bool {
        let mut jobs = self.jobs.lock().await;
        if let Some(existing) = jobs.get(&job.key) {
            if !existing.status.is_terminal() {
                debug!(
                    key = %job.key,
                    status = %existing.status,
                    "job key already live, skipping enqueue"
                );
                return false;
            }
            debug!(key = %job.key, status = %existing.status, "replacing terminal job");
        }
        debug!(key = %job.key, scheduled_at = %job.scheduled_at, "job enqueued");
        jobs.insert(job.key.clone(), job);
        true
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn list_pending(&self, until: DateTime<Utc>) -> Result<HashSet<String>, QueueError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .values()
            .filter(|j| j.status.is_pending() && j.scheduled_at <= until)
            .map(|j| j.key.clone())
            .collect())
    }

    async fn enqueue_at(
        &self,
        at: DateTime<Utc>,
        key: &str,
        payload: RecomputeRequest,
    ) -> Result<bool, QueueError> {
        if key.is_empty() {
            return Err(QueueError::InvalidKey(key.to_string()));
        }
        let job = Job {
            key: key.to_string(),
            payload,
            meta: JobMeta::default(),
            status: JobStatus::Scheduled,
            scheduled_at: at,
            enqueued_at: Utc::now(),
            finished_at: None,
            result_ttl: self.default_result_ttl,
            error: None,
        };
        Ok(self.insert(job).await)
    }

    async fn enqueue_now(
        &self,
        key: &str,
        payload: RecomputeRequest,
        meta: JobMeta,
        result_ttl: Duration,
    ) -> Result<bool, QueueError> {
        if key.is_empty() {
            return Err(QueueError::InvalidKey(key.to_string()));
        }
        let now = Utc::now();
        let job = Job {
            key: key.to_string(),
            payload,
            meta,
            status: JobStatus::Queued,
            scheduled_at: now,
            enqueued_at: now,
            finished_at: None,
            result_ttl,
            error: None,
        };
        Ok(self.insert(job).await)
    }

    async fn fetch(&self, key: &str, now: DateTime<Utc>) -> Result<Option<Job>, QueueError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.get(key).filter(|j| !j.is_expired(now)).cloned())
    }

    async fn take_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Job>, QueueError> {
        let mut jobs = self.jobs.lock().await;

        let mut due: Vec<(DateTime<Utc>, String)> = jobs
            .values()
            .filter(|j| j.status.is_pending() && j.scheduled_at <= now)
            .map(|j| (j.scheduled_at, j.key.clone()))
            .collect();
        due.sort();
        due.truncate(limit);

        let mut taken = Vec::with_capacity(due.len());
        for (_, key) in due {
            if let Some(job) = jobs.get_mut(&key) {
                job.status = JobStatus::Started;
                taken.push(job.clone());
            }
        }
        Ok(taken)
    }

    async fn finish(
        &self,
        key: &str,
        outcome: JobOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(key)
            .ok_or_else(|| QueueError::NotFound(key.to_string()))?;
        job.finished_at = Some(now);
        match outcome {
            JobOutcome::Finished => job.status = JobStatus::Finished,
            JobOutcome::Failed(reason) => {
                job.status = JobStatus::Failed;
                job.error = Some(reason);
            }
        }
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, QueueError> {
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|_, j| !j.is_expired(now));
        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, "purged expired job results");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_core::EntityRef;
    use chrono::Duration as ChronoDuration;

    fn payload(id: u64) -> RecomputeRequest {
        RecomputeRequest { entity: EntityRef::mid(id) }
    }

    #[tokio::test]
    async fn enqueue_under_same_key_is_ignored() {
        let queue = MemoryQueue::default();
        let at = Utc::now() + ChronoDuration::seconds(10);

        assert!(queue.enqueue_at(at, "k1", payload(1)).await.unwrap());
        assert!(!queue.enqueue_at(at, "k1", payload(2)).await.unwrap());

        let job = queue.fetch("k1", Utc::now()).await.unwrap().unwrap();
        assert_eq!(job.payload, payload(1));
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let queue = MemoryQueue::default();
        assert!(matches!(
            queue.enqueue_at(Utc::now(), "", payload(1)).await,
            Err(QueueError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn list_pending_respects_window() {
        let queue = MemoryQueue::default();
        let now = Utc::now();
        queue.enqueue_at(now + ChronoDuration::seconds(5), "soon", payload(1)).await.unwrap();
        queue.enqueue_at(now + ChronoDuration::seconds(50), "later", payload(2)).await.unwrap();

        let pending = queue.list_pending(now + ChronoDuration::seconds(10)).await.unwrap();
        assert!(pending.contains("soon"));
        assert!(!pending.contains("later"));
    }

    #[tokio::test]
    async fn take_due_claims_in_schedule_order() {
        let queue = MemoryQueue::default();
        let now = Utc::now();
        queue.enqueue_at(now - ChronoDuration::seconds(1), "b", payload(2)).await.unwrap();
        queue.enqueue_at(now - ChronoDuration::seconds(5), "a", payload(1)).await.unwrap();
        queue.enqueue_at(now + ChronoDuration::seconds(5), "c", payload(3)).await.unwrap();

        let taken = queue.take_due(now, 10).await.unwrap();
        let keys: Vec<&str> = taken.iter().map(|j| j.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(taken.iter().all(|j| j.status == JobStatus::Started));

        // Started jobs are no longer pending.
        let pending = queue.list_pending(now + ChronoDuration::seconds(10)).await.unwrap();
        assert_eq!(pending, HashSet::from(["c".to_string()]));
        assert!(queue.take_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn take_due_honours_limit() {
        let queue = MemoryQueue::default();
        let now = Utc::now();
        for i in 0..5 {
            queue
                .enqueue_at(now - ChronoDuration::seconds(i), &format!("k{i}"), payload(i as u64))
                .await
                .unwrap();
        }
        assert_eq!(queue.take_due(now, 2).await.unwrap().len(), 2);
        assert_eq!(queue.take_due(now, 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn finish_records_failure_and_expires_after_ttl() {
        let queue = MemoryQueue::default();
        queue
            .enqueue_now("od", payload(1), JobMeta::default(), Duration::from_secs(60))
            .await
            .unwrap();
        let now = Utc::now();
        queue.take_due(now, 1).await.unwrap();
        queue
            .finish("od", JobOutcome::Failed("boom".into()), now)
            .await
            .unwrap();

        let job = queue.fetch("od", now).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));

        // Expiry is judged against the caller's clock on every path.
        let later = now + ChronoDuration::seconds(61);
        assert!(queue.fetch("od", now + ChronoDuration::seconds(30)).await.unwrap().is_some());
        assert!(queue.fetch("od", later).await.unwrap().is_none());

        assert_eq!(queue.purge_expired(now + ChronoDuration::seconds(30)).await.unwrap(), 0);
        assert_eq!(queue.purge_expired(later).await.unwrap(), 1);
        assert!(queue.fetch("od", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminal_job_key_can_be_reused() {
        let queue = MemoryQueue::default();
        let now = Utc::now();
        queue.enqueue_at(now, "k", payload(1)).await.unwrap();
        queue.take_due(now, 1).await.unwrap();

        // Started jobs still hold their key.
        assert!(!queue.enqueue_at(now, "k", payload(1)).await.unwrap());

        queue
            .finish("k", JobOutcome::Failed("boom".into()), now)
            .await
            .unwrap();
        assert!(queue.enqueue_at(now, "k", payload(1)).await.unwrap());

        let job = queue.fetch("k", now).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Scheduled);
        assert!(job.error.is_none());
        assert_eq!(queue.list_pending(now).await.unwrap(), HashSet::from(["k".to_string()]));
    }

    #[tokio::test]
    async fn finish_unknown_key_is_not_found() {
        let queue = MemoryQueue::default();
        assert!(matches!(
            queue.finish("nope", JobOutcome::Finished, Utc::now()).await,
            Err(QueueError::NotFound(_))
        ));
    }
}
