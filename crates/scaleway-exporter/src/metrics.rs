//! Internal metrics for the exporter itself.

use std::time::Duration;

use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        family::Family,
        histogram::{exponential_buckets, Histogram},
    },
    registry::{Registry, Unit},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
struct CollectorLabels {
    collector: String,
}

const LATENCY_BUCKETS: [f64; 9] = [0.001, 0.005, 0.025, 0.1, 0.25, 1.0, 5.0, 30.0, 120.0];

fn latency_histogram() -> Histogram {
    Histogram::new(LATENCY_BUCKETS.into_iter())
}

/// Metrics of the exporter. Unlike scraped gauges, these persist across scrapes.
#[derive(Debug, Clone)]
pub(crate) struct ExporterMetrics {
    scrape_duration: Family<CollectorLabels, Histogram, fn() -> Histogram>,
    scraped_size: Histogram,
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self {
            scrape_duration: Family::new_with_constructor(latency_histogram),
            // 1 KiB to 1 MiB
            scraped_size: Histogram::new(exponential_buckets(1_024.0, 4.0, 6)),
        }
    }
}

impl ExporterMetrics {
    pub fn observe_scrape_duration(&self, collector: &str, duration: Duration) {
        let labels = CollectorLabels {
            collector: collector.to_owned(),
        };
        self.scrape_duration
            .get_or_create(&labels)
            .observe(duration.as_secs_f64());
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn observe_scraped_size(&self, size: usize) {
        self.scraped_size.observe(size as f64);
    }

    pub fn register_in(&self, registry: &mut Registry) {
        registry.register_with_unit(
            "scaleway_exporter_scrape_duration",
            "Time spent by each collector during a scrape",
            Unit::Seconds,
            self.scrape_duration.clone(),
        );
        registry.register_with_unit(
            "scaleway_exporter_scraped_size",
            "Size of the metrics payload returned by the exporter",
            Unit::Bytes,
            self.scraped_size.clone(),
        );
    }
}

#[cfg(test)]
mod tests {
    use prometheus_client::encoding::text;

    use super::*;

    #[test]
    fn metrics_are_shared_between_registries() {
        let metrics = ExporterMetrics::default();
        metrics.observe_scrape_duration("database", Duration::from_millis(20));

        let mut registry = Registry::default();
        metrics.register_in(&mut registry);
        // Observed after registration, so it must be visible via the registered clone.
        metrics.observe_scraped_size(2_000);

        let mut buffer = String::new();
        text::encode(&mut buffer, &registry).unwrap();
        let lines: Vec<_> = buffer.lines().collect();
        let expected_lines = [
            "# TYPE scaleway_exporter_scrape_duration_seconds histogram",
            "# UNIT scaleway_exporter_scrape_duration_seconds seconds",
            r#"scaleway_exporter_scrape_duration_seconds_count{collector="database"} 1"#,
            "scaleway_exporter_scraped_size_bytes_count 1",
        ];
        for line in expected_lines {
            assert!(lines.contains(&line), "{lines:#?}");
        }
    }
}
