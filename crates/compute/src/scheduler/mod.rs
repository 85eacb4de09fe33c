//! Recompute scheduling.
//!
//! Two ways a recompute reaches the queue: debounced automatic updates keyed
//! by (entity, time slot), and on-demand requests keyed by a random id.

pub mod debounce;
pub mod keys;
pub mod on_demand;

pub use debounce::{plan_next_job, DebounceScheduler, PlannedJob, ScheduledRecompute};
pub use keys::{decode_slot, initial_key, latest_pending, regular_key, KeySlot};
pub use on_demand::{is_on_demand, OnDemandTrigger, ON_DEMAND_JOB_TYPE};
