//! Pluggable report metrics.
//!
//! Every metric exposes static [`MetricMetadata`] plus one `calculate` step.
//! Three kinds exist, one per input shape:
//!
//! - [`ActivityMetric`]: primary metric of a leaf, computed from raw activity.
//! - [`AggregateMetric`]: primary metric of a mid/top, computed from the
//!   same-named entries of its children's reports.
//! - [`DerivedMetric`]: summary computed from one primary entry of the same
//!   report.
//!
//! A [`MetricSet`] is the fixed, ordered registry of all three.

pub mod activity;
pub mod aggregate;
pub mod series;
pub mod totals;

use std::sync::Arc;

use analytics_core::{
    ActivityEvent, DataSeries, EntityRef, Granularity, Statistics, StatisticsEntry,
    Transformation, ViewKind,
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::debug;

use crate::error::ReportError;

pub use activity::{AnnotationSpeedMetric, AnnotationTimeMetric, ObjectsMetric};
pub use aggregate::{AnnotationSpeedRollup, AnnotationTimeRollup, ObjectsRollup};
pub use totals::{TotalAnnotationSpeed, TotalObjectCount};

pub const OBJECTS: &str = "objects";
pub const ANNOTATION_SPEED: &str = "annotation_speed";
pub const ANNOTATION_TIME: &str = "annotation_time";
pub const TOTAL_ANNOTATION_SPEED: &str = "total_annotation_speed";
pub const TOTAL_OBJECT_COUNT: &str = "total_object_count";

/// Error raised by a metric's `calculate` step.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("missing input entry '{0}'")]
    MissingInput(String),
    #[error("{0}")]
    Failed(String),
}

/// The entity a metric is computed for and the pass it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct MetricScope {
    pub owner: EntityRef,
    pub as_of: DateTime<Utc>,
}

/// Static description of a metric, copied into every entry it produces.
#[derive(Debug, Clone)]
pub struct MetricMetadata {
    pub title: &'static str,
    pub description: &'static str,
    pub granularity: Granularity,
    pub default_view: ViewKind,
    pub transformations: Vec<Transformation>,
}

pub trait Metric: Send + Sync {
    /// Key of the produced entry in the report's statistics.
    fn name(&self) -> &'static str;

    fn metadata(&self) -> MetricMetadata;
}

pub trait ActivityMetric: Metric {
    fn calculate(
        &self,
        activity: &[ActivityEvent],
        scope: &MetricScope,
    ) -> Result<DataSeries, MetricError>;
}

pub trait AggregateMetric: Metric {
    /// `children` holds the entry named [`Metric::name`] of every child report.
    fn calculate(
        &self,
        children: &[&StatisticsEntry],
        scope: &MetricScope,
    ) -> Result<DataSeries, MetricError>;
}

pub trait DerivedMetric: Metric {
    /// Name of the primary entry this metric reads.
    fn source(&self) -> &'static str;

    fn calculate(
        &self,
        primary: &StatisticsEntry,
        scope: &MetricScope,
    ) -> Result<DataSeries, MetricError>;
}

/// Wrap a computed series with the metric's metadata.
pub fn statistics_entry<M: Metric + ?Sized>(metric: &M, dataseries: DataSeries) -> StatisticsEntry {
    let meta = metric.metadata();
    StatisticsEntry {
        title: meta.title.to_string(),
        description: meta.description.to_string(),
        granularity: meta.granularity,
        default_view: meta.default_view,
        transformations: meta.transformations,
        dataseries,
    }
}

fn named_entry<M: Metric + ?Sized>(
    metric: &M,
    dataseries: DataSeries,
) -> (String, StatisticsEntry) {
    (metric.name().to_string(), statistics_entry(metric, dataseries))
}

fn computation_failure<M: Metric + ?Sized>(metric: &M, source: MetricError) -> ReportError {
    ReportError::ComputationFailure {
        metric: metric.name().to_string(),
        source,
    }
}

/// Ordered registry of the metrics evaluated at each tree level.
#[derive(Clone, Default)]
pub struct MetricSet {
    activity: Vec<Arc<dyn ActivityMetric>>,
    aggregate: Vec<Arc<dyn AggregateMetric>>,
    derived: Vec<Arc<dyn DerivedMetric>>,
}

impl MetricSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in metrics: objects, annotation speed and time, plus their totals.
    pub fn standard() -> Self {
        Self::empty()
            .with_activity(Arc::new(ObjectsMetric))
            .with_activity(Arc::new(AnnotationSpeedMetric))
            .with_activity(Arc::new(AnnotationTimeMetric))
            .with_aggregate(Arc::new(ObjectsRollup))
            .with_aggregate(Arc::new(AnnotationSpeedRollup))
            .with_aggregate(Arc::new(AnnotationTimeRollup))
            .with_derived(Arc::new(TotalAnnotationSpeed))
            .with_derived(Arc::new(TotalObjectCount))
    }

    pub fn with_activity(mut self, metric: Arc<dyn ActivityMetric>) -> Self {
        self.activity.push(metric);
        self
    }

    pub fn with_aggregate(mut self, metric: Arc<dyn AggregateMetric>) -> Self {
        self.aggregate.push(metric);
        self
    }

    pub fn with_derived(mut self, metric: Arc<dyn DerivedMetric>) -> Self {
        self.derived.push(metric);
        self
    }

    /// Names of every entry a leaf report carries, in registry order.
    pub fn leaf_entry_names(&self) -> Vec<&'static str> {
        self.activity
            .iter()
            .map(|m| m.name())
            .chain(self.derived.iter().map(|m| m.name()))
            .collect()
    }

    /// Evaluate leaf primary metrics over raw activity, then the derived ones.
    pub fn compute_leaf(
        &self,
        activity: &[ActivityEvent],
        scope: &MetricScope,
    ) -> Result<Statistics, ReportError> {
        let primary: Statistics = self
            .activity
            .par_iter()
            .map(|metric| {
                metric
                    .calculate(activity, scope)
                    .map(|series| named_entry(metric.as_ref(), series))
                    .map_err(|e| computation_failure(metric.as_ref(), e))
            })
            .collect::<Result<_, _>>()?;

        debug!(owner = %scope.owner, events = activity.len(), "leaf primary metrics computed");
        self.with_derived_entries(primary, scope)
    }

    /// Evaluate aggregate metrics over children's statistics, then the derived ones.
    pub fn compute_aggregate(
        &self,
        children: &[Statistics],
        scope: &MetricScope,
    ) -> Result<Statistics, ReportError> {
        let primary: Statistics = self
            .aggregate
            .par_iter()
            .map(|metric| {
                let inputs = children
                    .iter()
                    .map(|child| {
                        child
                            .get(metric.name())
                            .ok_or_else(|| MetricError::MissingInput(metric.name().to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| computation_failure(metric.as_ref(), e))?;

                metric
                    .calculate(&inputs, scope)
                    .map(|series| named_entry(metric.as_ref(), series))
                    .map_err(|e| computation_failure(metric.as_ref(), e))
            })
            .collect::<Result<_, _>>()?;

        debug!(owner = %scope.owner, children = children.len(), "aggregate metrics computed");
        self.with_derived_entries(primary, scope)
    }

    fn with_derived_entries(
        &self,
        mut statistics: Statistics,
        scope: &MetricScope,
    ) -> Result<Statistics, ReportError> {
        let mut derived = Vec::with_capacity(self.derived.len());
        for metric in &self.derived {
            let source = statistics
                .get(metric.source())
                .ok_or_else(|| {
                    computation_failure(
                        metric.as_ref(),
                        MetricError::MissingInput(metric.source().to_string()),
                    )
                })?;
            let series = metric
                .calculate(source, scope)
                .map_err(|e| computation_failure(metric.as_ref(), e))?;
            derived.push(named_entry(metric.as_ref(), series));
        }
        statistics.extend(derived);
        Ok(statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_core::{ActivityAction, DataPoint};
    use chrono::TimeZone;

    fn scope() -> MetricScope {
        MetricScope {
            owner: EntityRef::leaf(1),
            as_of: Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
        }
    }

    fn event(day: u32, action: ActivityAction, objects: u64, minutes: u64) -> ActivityEvent {
        ActivityEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap(),
            action,
            objects,
            working_time_ms: minutes * 60_000,
        }
    }

    struct Exploding;

    impl Metric for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn metadata(&self) -> MetricMetadata {
            ObjectsMetric.metadata()
        }
    }

    impl ActivityMetric for Exploding {
        fn calculate(
            &self,
            _: &[ActivityEvent],
            _: &MetricScope,
        ) -> Result<DataSeries, MetricError> {
            Err(MetricError::Failed("division by zero".into()))
        }
    }

    #[test]
    fn leaf_report_has_all_standard_entries() {
        let set = MetricSet::standard();
        let activity = vec![
            event(1, ActivityAction::Create, 10, 30),
            event(1, ActivityAction::Update, 4, 10),
            event(2, ActivityAction::Delete, 2, 20),
        ];
        let stats = set.compute_leaf(&activity, &scope()).unwrap();

        let names: Vec<&str> = stats.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                ANNOTATION_SPEED,
                ANNOTATION_TIME,
                OBJECTS,
                TOTAL_ANNOTATION_SPEED,
                TOTAL_OBJECT_COUNT,
            ]
        );
        assert_eq!(set.leaf_entry_names().len(), 5);

        let total = &stats[TOTAL_OBJECT_COUNT].dataseries["total_object_count"];
        assert_eq!(total, &vec![DataPoint::new(8.0, scope().as_of)]);

        // 8 net objects over one hour of work.
        let speed = &stats[TOTAL_ANNOTATION_SPEED].dataseries["total_annotation_speed"];
        assert!((speed[0].value - 8.0).abs() < 1e-9);
    }

    #[test]
    fn failing_metric_reports_its_name() {
        let set = MetricSet::standard().with_activity(Arc::new(Exploding));
        let err = set.compute_leaf(&[], &scope()).unwrap_err();
        match err {
            ReportError::ComputationFailure { metric, .. } => assert_eq!(metric, "exploding"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn aggregate_requires_entry_in_every_child() {
        let set = MetricSet::standard();
        let full = set.compute_leaf(&[event(1, ActivityAction::Create, 1, 1)], &scope()).unwrap();
        let mut partial = full.clone();
        partial.remove(OBJECTS);

        let err = set.compute_aggregate(&[full, partial], &scope()).unwrap_err();
        match err {
            ReportError::ComputationFailure { metric, source } => {
                assert_eq!(metric, OBJECTS);
                assert!(matches!(source, MetricError::MissingInput(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn aggregate_of_no_children_is_zeroed() {
        let set = MetricSet::standard();
        let stats = set.compute_aggregate(&[], &scope()).unwrap();
        assert_eq!(stats.len(), 5);
        let total = &stats[TOTAL_OBJECT_COUNT].dataseries["total_object_count"];
        assert_eq!(total[0].value, 0.0);
    }

    #[test]
    fn derived_without_source_fails() {
        let set = MetricSet::empty().with_derived(Arc::new(TotalObjectCount));
        let err = set.compute_leaf(&[], &scope()).unwrap_err();
        assert!(matches!(err, ReportError::ComputationFailure { .. }));
    }
}
