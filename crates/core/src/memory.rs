//! In-memory entity and report stores.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::entity::{EntityId, EntityKind, EntityRef, Leaf, Mid, Top};
use crate::error::CoreError;
use crate::report::{Report, Statistics};
use crate::store::{EntityStore, ReportStore};

/// Serialized form of an entity tree, as loaded by the worker binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeFixture {
    #[serde(default)]
    pub tops: Vec<Top>,
    #[serde(default)]
    pub mids: Vec<Mid>,
    #[serde(default)]
    pub leaves: Vec<Leaf>,
}

impl TreeFixture {
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Roots of every subtree: all tops plus the mids without a top.
    pub fn roots(&self) -> Vec<EntityRef> {
        self.tops
            .iter()
            .map(Top::entity_ref)
            .chain(self.mids.iter().filter(|m| m.top_id.is_none()).map(Mid::entity_ref))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Tree {
    tops: BTreeMap<EntityId, Top>,
    mids: BTreeMap<EntityId, Mid>,
    leaves: BTreeMap<EntityId, Leaf>,
}

/// Entity tree held in memory. Mutations go through [`touch`](Self::touch)
/// and [`upsert_mid`](Self::upsert_mid).
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    tree: RwLock<Tree>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a fixture, rejecting dangling parent links.
    pub fn from_fixture(fixture: TreeFixture) -> Result<Self, CoreError> {
        let mut tree = Tree::default();
        for top in fixture.tops {
            tree.tops.insert(top.id, top);
        }
        for mid in fixture.mids {
            if let Some(top_id) = mid.top_id {
                if !tree.tops.contains_key(&top_id) {
                    return Err(CoreError::EntityNotFound(EntityRef::top(top_id)));
                }
            }
            tree.mids.insert(mid.id, mid);
        }
        for leaf in fixture.leaves {
            if !tree.mids.contains_key(&leaf.mid_id) {
                return Err(CoreError::EntityNotFound(EntityRef::mid(leaf.mid_id)));
            }
            tree.leaves.insert(leaf.id, leaf);
        }
        Ok(Self { tree: RwLock::new(tree) })
    }

    pub async fn upsert_mid(&self, mid: Mid) {
        self.tree.write().await.mids.insert(mid.id, mid);
    }

    /// Append activity to a leaf and mark it and its ancestors as mutated at `now`.
    pub async fn record_activity(
        &self,
        leaf_id: EntityId,
        event: crate::entity::ActivityEvent,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        {
            let mut tree = self.tree.write().await;
            let leaf = tree
                .leaves
                .get_mut(&leaf_id)
                .ok_or(CoreError::EntityNotFound(EntityRef::leaf(leaf_id)))?;
            leaf.activity.push(event);
        }
        self.touch(EntityRef::leaf(leaf_id), now).await
    }

    /// Set `updated_date = now` on `entity` and every ancestor.
    ///
    /// A parent's report is only recomputed when its own `updated_date` moves,
    /// so descendants' mutations must propagate upward.
    pub async fn touch(&self, entity: EntityRef, now: DateTime<Utc>) -> Result<(), CoreError> {
        let mut tree = self.tree.write().await;
        let mut mid_id = None;
        let mut top_id = None;

        match entity.kind {
            EntityKind::Leaf => {
                let leaf = tree
                    .leaves
                    .get_mut(&entity.id)
                    .ok_or(CoreError::EntityNotFound(entity))?;
                leaf.updated_date = now;
                mid_id = Some(leaf.mid_id);
            }
            EntityKind::Mid => mid_id = Some(entity.id),
            EntityKind::Top => top_id = Some(entity.id),
        }

        if let Some(id) = mid_id {
            let mid = tree
                .mids
                .get_mut(&id)
                .ok_or(CoreError::EntityNotFound(EntityRef::mid(id)))?;
            mid.updated_date = now;
            top_id = mid.top_id;
        }

        if let Some(id) = top_id {
            let top = tree
                .tops
                .get_mut(&id)
                .ok_or(CoreError::EntityNotFound(EntityRef::top(id)))?;
            top.updated_date = now;
        }

        debug!(entity = %entity, "entity touched");
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn leaf(&self, id: EntityId) -> Result<Leaf, CoreError> {
        self.tree
            .read()
            .await
            .leaves
            .get(&id)
            .cloned()
            .ok_or(CoreError::EntityNotFound(EntityRef::leaf(id)))
    }

    async fn mid(&self, id: EntityId) -> Result<Mid, CoreError> {
        self.tree
            .read()
            .await
            .mids
            .get(&id)
            .cloned()
            .ok_or(CoreError::EntityNotFound(EntityRef::mid(id)))
    }

    async fn top(&self, id: EntityId) -> Result<Top, CoreError> {
        self.tree
            .read()
            .await
            .tops
            .get(&id)
            .cloned()
            .ok_or(CoreError::EntityNotFound(EntityRef::top(id)))
    }

    async fn leaves_of(&self, mid_id: EntityId) -> Result<Vec<Leaf>, CoreError> {
        let tree = self.tree.read().await;
        if !tree.mids.contains_key(&mid_id) {
            return Err(CoreError::EntityNotFound(EntityRef::mid(mid_id)));
        }
        Ok(tree
            .leaves
            .values()
            .filter(|l| l.mid_id == mid_id)
            .cloned()
            .collect())
    }

    async fn mids_of(&self, top_id: EntityId) -> Result<Vec<Mid>, CoreError> {
        let tree = self.tree.read().await;
        if !tree.tops.contains_key(&top_id) {
            return Err(CoreError::EntityNotFound(EntityRef::top(top_id)));
        }
        Ok(tree
            .mids
            .values()
            .filter(|m| m.top_id == Some(top_id))
            .cloned()
            .collect())
    }
}

/// Reports held in memory, keyed by owner.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<EntityRef, Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn get(&self, entity: EntityRef) -> Result<Option<Report>, CoreError> {
        Ok(self.reports.read().await.get(&entity).cloned())
    }

    async fn create(
        &self,
        entity: EntityRef,
        statistics: Statistics,
        created_date: DateTime<Utc>,
    ) -> Result<Report, CoreError> {
        let report = Report { entity, created_date, statistics };
        self.reports.write().await.insert(entity, report.clone());
        Ok(report)
    }

    async fn save(&self, report: &Report) -> Result<(), CoreError> {
        self.reports.write().await.insert(report.entity, report.clone());
        Ok(())
    }

    async fn refresh(&self, report: &mut Report) -> Result<(), CoreError> {
        let stored = self
            .reports
            .read()
            .await
            .get(&report.entity)
            .cloned()
            .ok_or(CoreError::NotAvailable(report.entity))?;
        *report = stored;
        Ok(())
    }
}
