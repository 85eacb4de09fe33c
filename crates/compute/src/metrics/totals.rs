//! Derived metrics summarising the `annotation_speed` entry.

use analytics_core::{DataPoint, DataSeries, Granularity, StatisticsEntry, ViewKind};

use super::series::series_total;
use super::{
    DerivedMetric, Metric, MetricError, MetricMetadata, MetricScope, ANNOTATION_SPEED,
    TOTAL_ANNOTATION_SPEED, TOTAL_OBJECT_COUNT,
};

/// Net objects per working hour over the whole history.
pub struct TotalAnnotationSpeed;

impl Metric for TotalAnnotationSpeed {
    fn name(&self) -> &'static str {
        TOTAL_ANNOTATION_SPEED
    }

    fn metadata(&self) -> MetricMetadata {
        MetricMetadata {
            title: "Total annotation speed (objects per hour)",
            description: "Metric shows total annotation speed.",
            granularity: Granularity::Day,
            default_view: ViewKind::Numeric,
            transformations: vec![],
        }
    }
}

impl DerivedMetric for TotalAnnotationSpeed {
    fn source(&self) -> &'static str {
        ANNOTATION_SPEED
    }

    fn calculate(
        &self,
        primary: &StatisticsEntry,
        scope: &MetricScope,
    ) -> Result<DataSeries, MetricError> {
        let objects = series_total(&primary.dataseries, "object_count");
        let hours = series_total(&primary.dataseries, "working_time");
        let speed = if hours > 0.0 { objects / hours } else { 0.0 };

        Ok(DataSeries::from([(
            "total_annotation_speed".to_string(),
            vec![DataPoint::new(speed, scope.as_of)],
        )]))
    }
}

/// Net object count over the whole history.
pub struct TotalObjectCount;

impl Metric for TotalObjectCount {
    fn name(&self) -> &'static str {
        TOTAL_OBJECT_COUNT
    }

    fn metadata(&self) -> MetricMetadata {
        MetricMetadata {
            title: "Total objects count",
            description: "Metric shows total object count.",
            granularity: Granularity::Day,
            default_view: ViewKind::Numeric,
            transformations: vec![],
        }
    }
}

impl DerivedMetric for TotalObjectCount {
    fn source(&self) -> &'static str {
        ANNOTATION_SPEED
    }

    fn calculate(
        &self,
        primary: &StatisticsEntry,
        scope: &MetricScope,
    ) -> Result<DataSeries, MetricError> {
        let objects = series_total(&primary.dataseries, "object_count");

        Ok(DataSeries::from([(
            "total_object_count".to_string(),
            vec![DataPoint::new(objects, scope.as_of)],
        )]))
    }
}
