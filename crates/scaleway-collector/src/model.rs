//! Data model shared by all collectors: partitions, metric series and resources.

use chrono::{DateTime, Duration as TimeDelta, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use std::{borrow::Cow, collections::HashMap, time::Duration};

/// Number of availability zones in each Scaleway region.
const ZONES_PER_REGION: u8 = 3;

/// Geographic region, such as `fr-par`.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(Cow<'static, str>);

impl Region {
    /// Paris.
    pub const FR_PAR: Self = Self(Cow::Borrowed("fr-par"));
    /// Amsterdam.
    pub const NL_AMS: Self = Self(Cow::Borrowed("nl-ams"));
    /// Warsaw.
    pub const PL_WAW: Self = Self(Cow::Borrowed("pl-waw"));

    /// Returns all regions known to the exporter.
    pub fn all() -> Vec<Self> {
        vec![Self::FR_PAR, Self::NL_AMS, Self::PL_WAW]
    }

    /// Creates a region from an arbitrary identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the region identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the availability zones of this region (`fr-par-1`, `fr-par-2`, ...).
    pub fn zones(&self) -> Vec<Zone> {
        (1..=ZONES_PER_REGION)
            .map(|idx| Zone::new(format!("{self}-{idx}")))
            .collect()
    }
}

/// Availability zone, such as `fr-par-1`.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(Cow<'static, str>);

impl Zone {
    /// Creates a zone from an arbitrary identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the zone identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Single sample of a metric series.
///
/// The API encodes points as `[timestamp, value]` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "(DateTime<Utc>, f64)")]
pub struct Point {
    /// Time the sample was taken at.
    pub timestamp: DateTime<Utc>,
    /// Sampled value.
    pub value: f64,
}

impl From<(DateTime<Utc>, f64)> for Point {
    fn from((timestamp, value): (DateTime<Utc>, f64)) -> Self {
        Self { timestamp, value }
    }
}

/// Named stream of points for one metric of one resource.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TimeSeries {
    /// Upstream metric name, e.g. `cpu_usage_percent`.
    pub name: String,
    /// Samples in no particular order.
    #[serde(default)]
    pub points: Vec<Point>,
    /// Series metadata, e.g. the node or storage class the series applies to.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl TimeSeries {
    /// Returns a metadata value, or an empty string if it's missing.
    pub fn metadata(&self, key: &str) -> &str {
        self.metadata.get(key).map_or("", String::as_str)
    }
}

/// Response wrapper used by all metric endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SeriesResponse {
    #[serde(default)]
    pub timeseries: Vec<TimeSeries>,
}

/// Trailing time window metric series are requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Window start (inclusive).
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
}

impl Window {
    /// Default window length.
    pub const DEFAULT_LENGTH: Duration = Duration::from_secs(3_600);

    /// Creates a window ending now.
    pub fn trailing(length: Duration) -> Self {
        let end = Utc::now();
        let length = TimeDelta::from_std(length).unwrap_or(TimeDelta::hours(1));
        Self {
            start: end - length,
            end,
        }
    }

    /// Returns query parameters understood by the metrics endpoints.
    pub(crate) fn query(&self) -> [(&'static str, String); 2] {
        [
            ("start_date", self.start.to_rfc3339()),
            ("end_date", self.end.to_rfc3339()),
        ]
    }
}

/// Live cloud resource discovered by an inventory fetch.
pub trait Resource: Send + Sync + 'static {
    /// Stable identifier.
    fn id(&self) -> &str;
    /// Human-readable name.
    fn name(&self) -> &str;
}

/// Three-level liveness scale shared by all families with a status enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Fully operational.
    Healthy,
    /// Transitional state: migrating, scaling, provisioning, deleting etc.
    Degraded,
    /// Erroneous, stopped, locked or unknown.
    Down,
}

impl Liveness {
    /// Returns the gauge value for this liveness level.
    pub fn value(self) -> f64 {
        match self {
            Self::Healthy => 1.0,
            Self::Degraded => 0.5,
            Self::Down => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_zones() {
        let zones: Vec<_> = Region::NL_AMS.zones().into_iter().map(|z| z.to_string()).collect();
        assert_eq!(zones, ["nl-ams-1", "nl-ams-2", "nl-ams-3"]);
        assert_eq!(Region::new("fr-par"), Region::FR_PAR);
    }

    #[test]
    fn deserializing_series() {
        let raw = r#"{
            "name": "cpu_usage_percent",
            "points": [["2024-03-01T10:00:00Z", 5.0], ["2024-03-01T10:01:00Z", 9.5]],
            "metadata": { "node": "node-1" }
        }"#;
        let series: TimeSeries = serde_json::from_str(raw).unwrap();
        assert_eq!(series.name, "cpu_usage_percent");
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[1].value, 9.5);
        assert_eq!(series.metadata("node"), "node-1");
        assert_eq!(series.metadata("type"), "");
    }

    #[test]
    fn deserializing_series_without_points() {
        let series: TimeSeries = serde_json::from_str(r#"{ "name": "bytes_sent" }"#).unwrap();
        assert!(series.points.is_empty());
        assert!(series.metadata.is_empty());
    }

    #[test]
    fn liveness_scale() {
        assert_eq!(Liveness::Healthy.value(), 1.0);
        assert_eq!(Liveness::Degraded.value(), 0.5);
        assert_eq!(Liveness::Down.value(), 0.0);
    }

    #[test]
    fn window_query() {
        let window = Window::trailing(Window::DEFAULT_LENGTH);
        assert_eq!(window.end - window.start, TimeDelta::hours(1));
        let [(start_key, _), (end_key, _)] = window.query();
        assert_eq!((start_key, end_key), ("start_date", "end_date"));
    }
}
