//! Helpers for building and combining data series.

use std::collections::BTreeMap;

use analytics_core::{DataPoint, DataSeries, StatisticsEntry};
use chrono::{DateTime, NaiveTime, Utc};

/// Midnight (UTC) of the day containing `ts`.
pub fn day_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Turn a datetime -> value accumulator into an ordered series.
pub fn to_points(buckets: BTreeMap<DateTime<Utc>, f64>) -> Vec<DataPoint> {
    buckets
        .into_iter()
        .map(|(datetime, value)| DataPoint { value, datetime })
        .collect()
}

/// Sum several data series point-wise by series name and datetime.
///
/// Every name in `seed` is present in the output even when no entry carries it.
pub fn sum_dataseries(entries: &[&StatisticsEntry], seed: &[&str]) -> DataSeries {
    let mut acc: BTreeMap<String, BTreeMap<DateTime<Utc>, f64>> = seed
        .iter()
        .map(|name| (name.to_string(), BTreeMap::new()))
        .collect();

    for entry in entries {
        for (name, points) in &entry.dataseries {
            let buckets = acc.entry(name.clone()).or_default();
            for point in points {
                *buckets.entry(point.datetime).or_insert(0.0) += point.value;
            }
        }
    }

    acc.into_iter()
        .map(|(name, buckets)| (name, to_points(buckets)))
        .collect()
}

/// Sum of every value of one series; 0 when the series is absent.
pub fn series_total(dataseries: &DataSeries, name: &str) -> f64 {
    dataseries
        .get(name)
        .map(|points| points.iter().map(|p| p.value).sum())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_core::{Granularity, ViewKind};
    use chrono::TimeZone;

    fn entry(series: &[(&str, Vec<DataPoint>)]) -> StatisticsEntry {
        StatisticsEntry {
            title: String::new(),
            description: String::new(),
            granularity: Granularity::Day,
            default_view: ViewKind::Histogram,
            transformations: vec![],
            dataseries: series
                .iter()
                .map(|(n, p)| (n.to_string(), p.clone()))
                .collect(),
        }
    }

    #[test]
    fn day_start_truncates() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 17, 23, 59, 59).unwrap();
        assert_eq!(day_start(ts), Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap());
    }

    #[test]
    fn sum_merges_matching_datetimes() {
        let d1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let a = entry(&[("created", vec![DataPoint::new(1.0, d1), DataPoint::new(2.0, d2)])]);
        let b = entry(&[("created", vec![DataPoint::new(5.0, d2)])]);

        let merged = sum_dataseries(&[&a, &b], &["created", "deleted"]);
        assert_eq!(
            merged["created"],
            vec![DataPoint::new(1.0, d1), DataPoint::new(7.0, d2)]
        );
        assert!(merged["deleted"].is_empty());
    }

    #[test]
    fn total_of_missing_series_is_zero() {
        assert_eq!(series_total(&DataSeries::new(), "nope"), 0.0);
    }
}
