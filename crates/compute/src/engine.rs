use std::sync::Arc;
use std::time::Instant;

use analytics_core::{
    EntityKind, EntityRef, EntityStore, Leaf, Mid, Report, ReportStore, Statistics, Top,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::ReportError;
use crate::metrics::{MetricScope, MetricSet};

/// Staleness-checked, bottom-up report recomputation.
///
/// A report is recomputed only when it is absent or older than its entity's
/// `updated_date`. Mids and tops first bring every child up to date, then
/// aggregate the children's entries. Nothing is written for an entity whose
/// subtree failed; its previous report stays in place.
pub struct RecomputeEngine {
    entities: Arc<dyn EntityStore>,
    reports: Arc<dyn ReportStore>,
    metrics: Arc<MetricSet>,
}

impl RecomputeEngine {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        reports: Arc<dyn ReportStore>,
        metrics: Arc<MetricSet>,
    ) -> Self {
        Self { entities, reports, metrics }
    }

    pub async fn ensure_fresh(&self, entity: EntityRef) -> Result<Report, ReportError> {
        self.ensure_fresh_at(entity, Utc::now()).await
    }

    /// Bring the report of `entity` and all its descendants up to date.
    ///
    /// `now` becomes the `created_date` of every report written by this pass.
    pub async fn ensure_fresh_at(
        &self,
        entity: EntityRef,
        now: DateTime<Utc>,
    ) -> Result<Report, ReportError> {
        let start = Instant::now();

        let report = match entity.kind {
            EntityKind::Leaf => {
                let leaf = self.entities.leaf(entity.id).await?;
                self.refresh_leaf(&leaf, now).await?
            }
            EntityKind::Mid => {
                let mid = self.entities.mid(entity.id).await?;
                self.refresh_mid(&mid, now).await?
            }
            EntityKind::Top => {
                let top = self.entities.top(entity.id).await?;
                self.refresh_top(&top, now).await?
            }
        };

        info!(
            entity = %entity,
            created_date = %report.created_date,
            "report up to date in {:.1}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(report)
    }

    async fn refresh_leaf(&self, leaf: &Leaf, now: DateTime<Utc>) -> Result<Report, ReportError> {
        let entity = leaf.entity_ref();
        let existing = match self.cached(entity, leaf.updated_date).await? {
            Cached::Fresh(report) => return Ok(report),
            Cached::Stale(existing) => existing,
        };

        let scope = MetricScope { owner: entity, as_of: now };
        let statistics = self.metrics.compute_leaf(&leaf.activity, &scope)?;
        self.persist(entity, existing, statistics, now).await
    }

    async fn refresh_mid(&self, mid: &Mid, now: DateTime<Utc>) -> Result<Report, ReportError> {
        let entity = mid.entity_ref();
        let existing = match self.cached(entity, mid.updated_date).await? {
            Cached::Fresh(report) => return Ok(report),
            Cached::Stale(existing) => existing,
        };

        let leaves = self.entities.leaves_of(mid.id).await?;
        let mut children = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            children.push(self.refresh_leaf(leaf, now).await?.statistics);
        }

        let scope = MetricScope { owner: entity, as_of: now };
        let statistics = self.metrics.compute_aggregate(&children, &scope)?;
        self.persist(entity, existing, statistics, now).await
    }

    async fn refresh_top(&self, top: &Top, now: DateTime<Utc>) -> Result<Report, ReportError> {
        let entity = top.entity_ref();
        let existing = match self.cached(entity, top.updated_date).await? {
            Cached::Fresh(report) => return Ok(report),
            Cached::Stale(existing) => existing,
        };

        let mids = self.entities.mids_of(top.id).await?;
        let mut children = Vec::with_capacity(mids.len());
        for mid in &mids {
            let mut report = self.refresh_mid(mid, now).await?;
            // Another worker may have rewritten the child since we returned it.
            self.reports.refresh(&mut report).await?;
            children.push(report.statistics);
        }

        let scope = MetricScope { owner: entity, as_of: now };
        let statistics = self.metrics.compute_aggregate(&children, &scope)?;
        self.persist(entity, existing, statistics, now).await
    }

    async fn cached(
        &self,
        entity: EntityRef,
        updated_date: DateTime<Utc>,
    ) -> Result<Cached, ReportError> {
        match self.reports.get(entity).await? {
            Some(report) if report.is_fresh(updated_date) => {
                debug!(entity = %entity, "report is fresh, skipping recompute");
                Ok(Cached::Fresh(report))
            }
            existing => Ok(Cached::Stale(existing)),
        }
    }

    async fn persist(
        &self,
        entity: EntityRef,
        existing: Option<Report>,
        statistics: Statistics,
        now: DateTime<Utc>,
    ) -> Result<Report, ReportError> {
        let report = match existing {
            Some(mut report) => {
                report.statistics = statistics;
                report.created_date = now;
                self.reports.save(&report).await?;
                report
            }
            None => self.reports.create(entity, statistics, now).await?,
        };
        debug!(entity = %entity, entries = report.statistics.len(), "report persisted");
        Ok(report)
    }
}

enum Cached {
    Fresh(Report),
    Stale(Option<Report>),
}
