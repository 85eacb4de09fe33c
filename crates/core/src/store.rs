//! Storage boundaries for entities and reports.
//!
//! Both traits describe collaborators owned by the host application. The
//! in-memory implementations in [`crate::memory`] back the worker binary and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::{EntityId, EntityKind, EntityRef, Leaf, Mid, Top};
use crate::error::CoreError;
use crate::report::{Report, Statistics};

/// Read access to the entity tree.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn leaf(&self, id: EntityId) -> Result<Leaf, CoreError>;

    async fn mid(&self, id: EntityId) -> Result<Mid, CoreError>;

    async fn top(&self, id: EntityId) -> Result<Top, CoreError>;

    /// Leaves owned by a mid, ordered by id.
    async fn leaves_of(&self, mid_id: EntityId) -> Result<Vec<Leaf>, CoreError>;

    /// Mids owned by a top, ordered by id.
    async fn mids_of(&self, top_id: EntityId) -> Result<Vec<Mid>, CoreError>;

    /// Last mutation time of any entity.
    async fn updated_date(&self, entity: EntityRef) -> Result<DateTime<Utc>, CoreError> {
        match entity.kind {
            EntityKind::Leaf => Ok(self.leaf(entity.id).await?.updated_date),
            EntityKind::Mid => Ok(self.mid(entity.id).await?.updated_date),
            EntityKind::Top => Ok(self.top(entity.id).await?.updated_date),
        }
    }

    /// The outermost container of the subtree `entity` belongs to.
    async fn root_of(&self, entity: EntityRef) -> Result<EntityRef, CoreError> {
        match entity.kind {
            EntityKind::Leaf => {
                let leaf = self.leaf(entity.id).await?;
                Ok(self.mid(leaf.mid_id).await?.root())
            }
            EntityKind::Mid => Ok(self.mid(entity.id).await?.root()),
            EntityKind::Top => Ok(entity),
        }
    }
}

/// Persisted report per entity.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get(&self, entity: EntityRef) -> Result<Option<Report>, CoreError>;

    /// Create the report of `entity`. A concurrent writer that created it first is overwritten.
    async fn create(
        &self,
        entity: EntityRef,
        statistics: Statistics,
        created_date: DateTime<Utc>,
    ) -> Result<Report, CoreError>;

    async fn save(&self, report: &Report) -> Result<(), CoreError>;

    /// Re-read `report` from storage to observe other writers.
    async fn refresh(&self, report: &mut Report) -> Result<(), CoreError>;
}
