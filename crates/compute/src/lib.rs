//! Report recomputation: metric plugins, the staleness-checked engine, the
//! debounced scheduler and the queue worker that ties them together.

pub mod engine;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod worker;

pub use engine::RecomputeEngine;
pub use error::ReportError;
pub use metrics::{MetricError, MetricScope, MetricSet};
pub use scheduler::{DebounceScheduler, OnDemandTrigger, ScheduledRecompute, ON_DEMAND_JOB_TYPE};
pub use worker::{ReportWorker, WorkerMetrics, WorkerTick};
