//! Leaf primary metrics, computed from raw activity.

use std::collections::BTreeMap;

use analytics_core::{
    ActivityAction, ActivityEvent, BinaryOperation, BinaryOperator, DataPoint, DataSeries,
    Granularity, Transformation, ViewKind,
};

use super::series::{day_start, to_points};
use super::{
    ActivityMetric, Metric, MetricError, MetricMetadata, MetricScope, ANNOTATION_SPEED,
    ANNOTATION_TIME, OBJECTS,
};

const MS_PER_HOUR: f64 = 3_600_000.0;

pub(crate) fn objects_metadata() -> MetricMetadata {
    MetricMetadata {
        title: "Objects",
        description: "Metric shows number of added/changed/deleted objects.",
        granularity: Granularity::Day,
        default_view: ViewKind::Histogram,
        transformations: vec![],
    }
}

pub(crate) fn annotation_speed_metadata() -> MetricMetadata {
    MetricMetadata {
        title: "Annotation speed (objects per hour)",
        description: "Metric shows the annotation speed in objects per hour.",
        granularity: Granularity::Day,
        default_view: ViewKind::Histogram,
        transformations: vec![Transformation {
            name: "annotation_speed".to_string(),
            binary: BinaryOperation {
                left: "object_count".to_string(),
                operator: BinaryOperator::Division,
                right: "working_time".to_string(),
            },
        }],
    }
}

pub(crate) fn annotation_time_metadata() -> MetricMetadata {
    MetricMetadata {
        title: "Annotation time (hours)",
        description: "Metric shows how long the annotation took.",
        granularity: Granularity::Day,
        default_view: ViewKind::Numeric,
        transformations: vec![],
    }
}

/// Per-day created/updated/deleted object counts.
pub struct ObjectsMetric;

impl Metric for ObjectsMetric {
    fn name(&self) -> &'static str {
        OBJECTS
    }

    fn metadata(&self) -> MetricMetadata {
        objects_metadata()
    }
}

impl ActivityMetric for ObjectsMetric {
    fn calculate(
        &self,
        activity: &[ActivityEvent],
        _scope: &MetricScope,
    ) -> Result<DataSeries, MetricError> {
        let mut created = BTreeMap::new();
        let mut updated = BTreeMap::new();
        let mut deleted = BTreeMap::new();

        for event in activity {
            let bucket = match event.action {
                ActivityAction::Create => &mut created,
                ActivityAction::Update => &mut updated,
                ActivityAction::Delete => &mut deleted,
            };
            *bucket.entry(day_start(event.timestamp)).or_insert(0.0) += event.objects as f64;
        }

        Ok(DataSeries::from([
            ("created".to_string(), to_points(created)),
            ("updated".to_string(), to_points(updated)),
            ("deleted".to_string(), to_points(deleted)),
        ]))
    }
}

/// Per-day net object growth and working hours.
pub struct AnnotationSpeedMetric;

impl Metric for AnnotationSpeedMetric {
    fn name(&self) -> &'static str {
        ANNOTATION_SPEED
    }

    fn metadata(&self) -> MetricMetadata {
        annotation_speed_metadata()
    }
}

impl ActivityMetric for AnnotationSpeedMetric {
    fn calculate(
        &self,
        activity: &[ActivityEvent],
        _scope: &MetricScope,
    ) -> Result<DataSeries, MetricError> {
        let mut object_count: BTreeMap<_, f64> = BTreeMap::new();
        let mut working_time: BTreeMap<_, f64> = BTreeMap::new();

        for event in activity {
            let day = day_start(event.timestamp);
            let delta = match event.action {
                ActivityAction::Create => event.objects as f64,
                ActivityAction::Delete => -(event.objects as f64),
                ActivityAction::Update => 0.0,
            };
            *object_count.entry(day).or_insert(0.0) += delta;
            *working_time.entry(day).or_insert(0.0) += event.working_time_ms as f64 / MS_PER_HOUR;
        }

        Ok(DataSeries::from([
            ("object_count".to_string(), to_points(object_count)),
            ("working_time".to_string(), to_points(working_time)),
        ]))
    }
}

/// Total working hours as one point at the pass time.
pub struct AnnotationTimeMetric;

impl Metric for AnnotationTimeMetric {
    fn name(&self) -> &'static str {
        ANNOTATION_TIME
    }

    fn metadata(&self) -> MetricMetadata {
        annotation_time_metadata()
    }
}

impl ActivityMetric for AnnotationTimeMetric {
    fn calculate(
        &self,
        activity: &[ActivityEvent],
        scope: &MetricScope,
    ) -> Result<DataSeries, MetricError> {
        let hours: f64 = activity
            .iter()
            .map(|e| e.working_time_ms as f64 / MS_PER_HOUR)
            .sum();

        Ok(DataSeries::from([(
            "total_annotating_time".to_string(),
            vec![DataPoint::new(hours, scope.as_of)],
        )]))
    }
}
