//! Mid/top primary metrics: roll children's entries up one level.

use analytics_core::{DataPoint, DataSeries, StatisticsEntry};

use super::activity::{annotation_speed_metadata, annotation_time_metadata, objects_metadata};
use super::series::{series_total, sum_dataseries};
use super::{
    AggregateMetric, Metric, MetricError, MetricMetadata, MetricScope, ANNOTATION_SPEED,
    ANNOTATION_TIME, OBJECTS,
};

/// Point-wise sum of children's `objects` series.
pub struct ObjectsRollup;

impl Metric for ObjectsRollup {
    fn name(&self) -> &'static str {
        OBJECTS
    }

    fn metadata(&self) -> MetricMetadata {
        objects_metadata()
    }
}

impl AggregateMetric for ObjectsRollup {
    fn calculate(
        &self,
        children: &[&StatisticsEntry],
        _scope: &MetricScope,
    ) -> Result<DataSeries, MetricError> {
        Ok(sum_dataseries(children, &["created", "updated", "deleted"]))
    }
}

/// Point-wise sum of children's `annotation_speed` series.
pub struct AnnotationSpeedRollup;

impl Metric for AnnotationSpeedRollup {
    fn name(&self) -> &'static str {
        ANNOTATION_SPEED
    }

    fn metadata(&self) -> MetricMetadata {
        annotation_speed_metadata()
    }
}

impl AggregateMetric for AnnotationSpeedRollup {
    fn calculate(
        &self,
        children: &[&StatisticsEntry],
        _scope: &MetricScope,
    ) -> Result<DataSeries, MetricError> {
        Ok(sum_dataseries(children, &["object_count", "working_time"]))
    }
}

/// Children's total annotating time, collapsed into one point at the pass time.
///
/// Children computed in earlier passes carry older timestamps, so their points
/// are summed regardless of datetime.
pub struct AnnotationTimeRollup;

impl Metric for AnnotationTimeRollup {
    fn name(&self) -> &'static str {
        ANNOTATION_TIME
    }

    fn metadata(&self) -> MetricMetadata {
        annotation_time_metadata()
    }
}

impl AggregateMetric for AnnotationTimeRollup {
    fn calculate(
        &self,
        children: &[&StatisticsEntry],
        scope: &MetricScope,
    ) -> Result<DataSeries, MetricError> {
        let hours: f64 = children
            .iter()
            .map(|c| series_total(&c.dataseries, "total_annotating_time"))
            .sum();

        Ok(DataSeries::from([(
            "total_annotating_time".to_string(),
            vec![DataPoint::new(hours, scope.as_of)],
        )]))
    }
}
