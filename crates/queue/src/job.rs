//! Queued job record and its lifecycle.

use std::fmt;
use std::time::Duration;

use analytics_core::EntityRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of every recompute job: which entity to bring up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeRequest {
    pub entity: EntityRef,
}

/// Free-form tags attached at enqueue time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    pub job_type: Option<String>,
    pub requested_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for its scheduled time.
    Scheduled,
    /// Due, waiting for a worker.
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobStatus {
    /// Not yet picked up by a worker.
    pub fn is_pending(self) -> bool {
        matches!(self, JobStatus::Scheduled | JobStatus::Queued)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Scheduled => write!(f, "scheduled"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Started => write!(f, "started"),
            JobStatus::Finished => write!(f, "finished"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result reported by a worker when it completes a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Finished,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub key: String,
    pub payload: RecomputeRequest,
    pub meta: JobMeta,
    pub status: JobStatus,
    /// Earliest time a worker may run the job.
    pub scheduled_at: DateTime<Utc>,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// How long the job stays fetchable after it finished or failed.
    pub result_ttl: Duration,
    pub error: Option<String>,
}

impl Job {
    /// Whether a terminal job's retention has run out at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.finished_at {
            Some(finished) if self.status.is_terminal() => {
                let ttl = chrono::Duration::from_std(self.result_ttl)
                    .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
                finished
                    .checked_add_signed(ttl)
                    .map_or(false, |expires| expires <= now)
            }
            _ => false,
        }
    }
}
