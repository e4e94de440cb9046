//! Information about the exporter itself.

use std::sync::atomic::AtomicU64;

use chrono::{DateTime, Utc};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
struct BuildLabels {
    version: String,
    revision: String,
}

/// Build information and start time of the exporter.
#[derive(Debug, Clone)]
pub struct ExporterInfo {
    version: String,
    revision: String,
    start_time: DateTime<Utc>,
}

impl ExporterInfo {
    /// Creates info for an exporter starting now.
    pub fn new(version: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            revision: revision.into(),
            start_time: Utc::now(),
        }
    }

    /// Returns the exporter version.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub(crate) fn register_in(&self, registry: &mut Registry) {
        let build_info = Family::<BuildLabels, Gauge>::default();
        let labels = BuildLabels {
            version: self.version.clone(),
            revision: self.revision.clone(),
        };
        build_info.get_or_create(&labels).set(1);
        registry.register(
            "scaleway_exporter_build_info",
            "A metric with a constant '1' value labeled by version and revision of the exporter",
            build_info,
        );

        let start_time = Gauge::<f64, AtomicU64>::default();
        #[allow(clippy::cast_precision_loss)]
        let started_at = self.start_time.timestamp_millis() as f64 / 1_000.0;
        start_time.set(started_at);
        registry.register(
            "scaleway_exporter_start_time_seconds",
            "Start time of the exporter since unix epoch in seconds",
            start_time,
        );
    }
}
