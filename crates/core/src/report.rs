use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;

/// Time bucket size of a metric's data points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

/// How a client should render a metric by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Histogram,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOperator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

/// `left <operator> right` over two series of the same dataseries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryOperation {
    pub left: String,
    pub operator: BinaryOperator,
    pub right: String,
}

/// A named client-side transformation advertised with a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub name: String,
    pub binary: BinaryOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub value: f64,
    pub datetime: DateTime<Utc>,
}

impl DataPoint {
    pub fn new(value: f64, datetime: DateTime<Utc>) -> Self {
        Self { value, datetime }
    }
}

/// Output of one metric: series name -> ordered data points.
pub type DataSeries = BTreeMap<String, Vec<DataPoint>>;

/// One named metric's static metadata plus its computed series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsEntry {
    pub title: String,
    pub description: String,
    pub granularity: Granularity,
    pub default_view: ViewKind,
    pub transformations: Vec<Transformation>,
    pub dataseries: DataSeries,
}

/// Metric name -> entry.
pub type Statistics = BTreeMap<String, StatisticsEntry>;

/// Persisted analytics report of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub entity: EntityRef,
    /// Start of the computation pass that produced `statistics`.
    pub created_date: DateTime<Utc>,
    pub statistics: Statistics,
}

impl Report {
    /// A report is fresh when it was computed no earlier than the entity's last mutation.
    pub fn is_fresh(&self, updated_date: DateTime<Utc>) -> bool {
        self.created_date >= updated_date
    }

    pub fn entry(&self, metric: &str) -> Option<&StatisticsEntry> {
        self.statistics.get(metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn report_at(created: DateTime<Utc>) -> Report {
        Report {
            entity: EntityRef::leaf(1),
            created_date: created,
            statistics: Statistics::new(),
        }
    }

    #[test]
    fn freshness_is_inclusive() {
        let t = Utc::now();
        assert!(report_at(t).is_fresh(t));
        assert!(report_at(t).is_fresh(t - Duration::seconds(1)));
        assert!(!report_at(t).is_fresh(t + Duration::milliseconds(1)));
    }

    #[test]
    fn statistics_entry_json_shape() {
        let entry = StatisticsEntry {
            title: "Objects".into(),
            description: "d".into(),
            granularity: Granularity::Day,
            default_view: ViewKind::Histogram,
            transformations: vec![],
            dataseries: DataSeries::new(),
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["granularity"], "day");
        assert_eq!(v["default_view"], "histogram");
        assert!(v["dataseries"].is_object());
    }
}
