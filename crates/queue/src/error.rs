//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid job key: {0}")]
    InvalidKey(String),

    #[error("provider error: {0}")]
    Provider(String),
}
