use analytics_core::CoreError;
use analytics_queue::QueueError;

use crate::metrics::MetricError;

/// Errors surfaced by scheduling and recomputation.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The requested report or job does not exist or is not of the expected kind.
    #[error("not available: {0}")]
    NotAvailable(String),

    /// A metric failed; nothing was persisted for the entity being computed.
    #[error("metric '{metric}' failed: {source}")]
    ComputationFailure {
        metric: String,
        #[source]
        source: MetricError,
    },

    #[error("store failure: {0}")]
    StoreFailure(String),

    #[error("queue failure: {0}")]
    Queue(#[from] QueueError),
}

impl From<CoreError> for ReportError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EntityNotFound(entity) => {
                ReportError::NotAvailable(format!("entity {entity} does not exist"))
            }
            CoreError::NotAvailable(entity) => {
                ReportError::NotAvailable(format!("report of {entity} does not exist"))
            }
            other => ReportError::StoreFailure(other.to_string()),
        }
    }
}
