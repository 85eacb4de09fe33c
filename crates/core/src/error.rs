use thiserror::Error;

use crate::entity::EntityRef;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityRef),

    #[error("Report not available: {0}")]
    NotAvailable(EntityRef),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid entity reference: {0}")]
    InvalidRef(String),
}
