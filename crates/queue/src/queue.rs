//! Delayed job queue trait.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::QueueError;
use crate::job::{Job, JobMeta, JobOutcome, RecomputeRequest};

/// Trait for delayed/immediate job queue backends.
///
/// Keys are the only deduplication mechanism: enqueueing under a key held by
/// a pending or running job is a no-op and reports `Ok(false)`. A finished or
/// failed job does not hold its key.
///
/// Time-dependent operations take the caller's `now`; backends never read the
/// wall clock to decide expiry.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Keys of jobs not yet picked up whose scheduled time is `<= until`.
    async fn list_pending(&self, until: DateTime<Utc>) -> Result<HashSet<String>, QueueError>;

    /// Schedule a job to become runnable at `at`. Returns whether it was inserted.
    async fn enqueue_at(
        &self,
        at: DateTime<Utc>,
        key: &str,
        payload: RecomputeRequest,
    ) -> Result<bool, QueueError>;

    /// Make a job runnable immediately, retaining its result for `result_ttl`.
    async fn enqueue_now(
        &self,
        key: &str,
        payload: RecomputeRequest,
        meta: JobMeta,
        result_ttl: Duration,
    ) -> Result<bool, QueueError>;

    /// Look up a job by key. Jobs expired at `now` are reported as absent.
    async fn fetch(&self, key: &str, now: DateTime<Utc>) -> Result<Option<Job>, QueueError>;

    /// Claim up to `limit` jobs due at `now`, oldest first, marking them started.
    async fn take_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Job>, QueueError>;

    /// Record the outcome of a started job.
    async fn finish(
        &self,
        key: &str,
        outcome: JobOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError>;

    /// Drop terminal jobs whose retention ran out. Returns how many were removed.
    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, QueueError> {
        Ok(0) // Default: backend expires results on its own
    }
}
