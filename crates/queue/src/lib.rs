pub mod error;
pub mod job;
pub mod memory;
pub mod queue;

pub use error::QueueError;
pub use job::{Job, JobMeta, JobOutcome, JobStatus, RecomputeRequest};
pub use memory::MemoryQueue;
pub use queue::JobQueue;
