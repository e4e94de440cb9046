//! Scrape orchestration: running all collectors under a shared deadline and turning
//! their output into a metrics registry.

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Write as _},
    sync::atomic::AtomicU64,
    time::Duration,
};

use futures::future;
use prometheus_client::{
    encoding::{EncodeLabelValue, LabelValueEncoder},
    metrics::{family::Family, gauge::Gauge},
    registry::Registry,
};
use tokio::time::{self, Instant};

use crate::{
    collector::{Collect, ObservationSink},
    descriptors::{Descriptor, Observation},
    errors::ErrorCounters,
    info::ExporterInfo,
    upstream::ScrapeContext,
};

/// Time given to collectors after the scrape deadline to wrap up (e.g., to log timed out calls).
const DEADLINE_GRACE: Duration = Duration::from_millis(100);

type FloatGauge = Gauge<f64, AtomicU64>;

/// Label value escaped according to the text exposition formats on encoding.
/// Values of some labels (e.g., billing descriptions) are free text provided by the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EscapedLabelValue(String);

impl EncodeLabelValue for EscapedLabelValue {
    fn encode(&self, encoder: &mut LabelValueEncoder<'_>) -> fmt::Result {
        for ch in self.0.chars() {
            match ch {
                '\\' => encoder.write_str("\\\\")?,
                '"' => encoder.write_str("\\\"")?,
                '\n' => encoder.write_str("\\n")?,
                _ => encoder.write_char(ch)?,
            }
        }
        Ok(())
    }
}

/// Outcome of running a single collector during a scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorRun {
    /// Collector name.
    pub name: &'static str,
    /// Time spent in the collector.
    pub duration: Duration,
    /// Whether the collector finished before the scrape deadline.
    pub completed: bool,
}

/// Results of a single scrape.
#[derive(Debug, Default)]
pub struct Scrape {
    observations: Vec<Observation>,
    runs: Vec<CollectorRun>,
}

impl Scrape {
    /// Returns all observations emitted during the scrape in no particular order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Returns per-collector outcomes in the collector registration order.
    pub fn runs(&self) -> &[CollectorRun] {
        &self.runs
    }

    /// Checks whether all collectors finished before the deadline.
    pub fn is_complete(&self) -> bool {
        self.runs.iter().all(|run| run.completed)
    }
}

/// Runs all registered collectors on each scrape.
#[derive(Debug)]
pub struct Orchestrator {
    collectors: Vec<Box<dyn Collect>>,
    errors: ErrorCounters,
    info: Option<ExporterInfo>,
    timeout: Duration,
}

impl Orchestrator {
    /// Default scrape timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates an orchestrator without collectors. `errors` are the counters collectors
    /// are registered in; they are exported on each scrape.
    pub fn new(errors: ErrorCounters, timeout: Duration) -> Self {
        Self {
            collectors: Vec::new(),
            errors,
            info: None,
            timeout,
        }
    }

    /// Adds a collector.
    #[must_use]
    pub fn with_collector(mut self, collector: impl Collect + 'static) -> Self {
        self.collectors.push(Box::new(collector));
        self
    }

    /// Sets exporter information exported on each scrape.
    #[must_use]
    pub fn with_info(mut self, info: ExporterInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Returns names of all registered collectors.
    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|collector| collector.name()).collect()
    }

    /// Returns error counters of all collectors.
    pub fn errors(&self) -> &ErrorCounters {
        &self.errors
    }

    /// Returns the scrape timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns descriptors of all gauges collectors can emit, without duplicates.
    pub fn describe(&self) -> Vec<&'static Descriptor> {
        let mut names = HashSet::new();
        self.collectors
            .iter()
            .flat_map(|collector| collector.describe())
            .filter(|descriptor| names.insert(descriptor.name))
            .collect()
    }

    /// Runs all collectors concurrently.
    ///
    /// Each upstream call is bounded by the scrape deadline. Collectors still running shortly
    /// after the deadline are dropped; observations they emitted before that are retained.
    pub async fn scrape(&self) -> Scrape {
        let cx = ScrapeContext::new(self.timeout);
        let hard_deadline = cx.deadline() + DEADLINE_GRACE;
        let (sink, mut receiver) = ObservationSink::channel();

        let runs = self.collectors.iter().map(|collector| {
            let (sink, cx) = (&sink, &cx);
            async move {
                let started_at = Instant::now();
                let completed = time::timeout_at(hard_deadline, collector.collect(sink, cx))
                    .await
                    .is_ok();
                let duration = started_at.elapsed();
                if !completed {
                    tracing::warn!(
                        collector = collector.name(),
                        ?duration,
                        "Collector didn't finish before the scrape deadline; its output may be partial"
                    );
                }
                CollectorRun {
                    name: collector.name(),
                    duration,
                    completed,
                }
            }
        });
        let runs = future::join_all(runs).await;
        drop(sink);

        let mut observations = Vec::new();
        while let Ok(observation) = receiver.try_recv() {
            observations.push(observation);
        }
        tracing::debug!(
            observations = observations.len(),
            "Scrape finished"
        );
        Scrape { observations, runs }
    }

    /// Creates a registry with the scraped gauges, error counters and exporter info.
    pub fn registry(&self, scrape: &Scrape) -> Registry {
        let mut registry = Registry::default();
        if let Some(info) = &self.info {
            info.register_in(&mut registry);
        }
        self.errors.register_in(&mut registry);

        let mut slots = HashMap::new();
        let observed = scrape.observations.iter().map(Observation::descriptor);
        for descriptor in self.describe().into_iter().chain(observed) {
            slots
                .entry(descriptor.name)
                .or_insert_with(|| GaugeSlot::register(descriptor, &mut registry));
        }

        for observation in &scrape.observations {
            match &slots[observation.descriptor().name] {
                GaugeSlot::Plain(gauge) => {
                    gauge.set(observation.value());
                }
                GaugeSlot::Labeled(family) => {
                    let labels: Vec<_> = observation
                        .labels()
                        .map(|(name, value)| {
                            (name.to_owned(), EscapedLabelValue(value.to_owned()))
                        })
                        .collect();
                    family.get_or_create(&labels).set(observation.value());
                }
            }
        }
        registry
    }
}

/// Gauge registered for a descriptor. Unlabeled gauges are registered directly,
/// so that they're encoded without an empty label set.
#[derive(Debug)]
enum GaugeSlot {
    Plain(FloatGauge),
    Labeled(Family<Vec<(String, EscapedLabelValue)>, FloatGauge>),
}

impl GaugeSlot {
    fn register(descriptor: &Descriptor, registry: &mut Registry) -> Self {
        if descriptor.labels.is_empty() {
            let gauge = FloatGauge::default();
            registry.register(descriptor.name, descriptor.help, gauge.clone());
            Self::Plain(gauge)
        } else {
            let family = Family::default();
            registry.register(descriptor.name, descriptor.help, family.clone());
            Self::Labeled(family)
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        descriptors::GaugeDescriptor,
        format::Format,
        label_set,
        labels::NoLabels,
    };

    label_set! {
        struct TestLabels {
            id => "id",
        }
    }

    static TEST_GAUGE: GaugeDescriptor<TestLabels> =
        GaugeDescriptor::new("test_gauge", "Test gauge");
    static TEST_TIMESTAMP: GaugeDescriptor<NoLabels> =
        GaugeDescriptor::new("test_timestamp_seconds", "Test timestamp");

    /// Collector emitting a fixed set of observations, then optionally hanging
    /// without respecting the scrape context.
    #[derive(Debug)]
    struct StubCollector {
        name: &'static str,
        ids: Vec<&'static str>,
        hang_for: Option<Duration>,
    }

    impl StubCollector {
        fn new(name: &'static str, ids: &[&'static str]) -> Self {
            Self {
                name,
                ids: ids.to_vec(),
                hang_for: None,
            }
        }
    }

    #[async_trait]
    impl Collect for StubCollector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn describe(&self) -> Vec<&'static Descriptor> {
            vec![TEST_GAUGE.descriptor(), TEST_TIMESTAMP.descriptor()]
        }

        async fn collect(&self, sink: &ObservationSink, _cx: &ScrapeContext) {
            for (i, &id) in self.ids.iter().enumerate() {
                let labels = TestLabels { id: id.to_owned() };
                #[allow(clippy::cast_precision_loss)]
                sink.emit(TEST_GAUGE.observe(labels, i as f64));
            }
            if let Some(duration) = self.hang_for {
                time::sleep(duration).await;
            }
            sink.emit(TEST_TIMESTAMP.observe(NoLabels, 1_700_000_000.0));
        }
    }

    #[test]
    fn describing_collectors() {
        let orchestrator = Orchestrator::new(ErrorCounters::default(), Orchestrator::DEFAULT_TIMEOUT)
            .with_collector(StubCollector::new("first", &[]))
            .with_collector(StubCollector::new("second", &[]));
        assert_eq!(orchestrator.collector_names(), ["first", "second"]);

        let names: Vec<_> = orchestrator.describe().iter().map(|d| d.name).collect();
        assert_eq!(names, ["test_gauge", "test_timestamp_seconds"]);
    }

    #[tokio::test]
    async fn scraping_and_encoding() {
        let errors = ErrorCounters::default();
        errors.register("stub").inc();
        let orchestrator = Orchestrator::new(errors, Orchestrator::DEFAULT_TIMEOUT)
            .with_collector(StubCollector::new("stub", &["a", "b"]))
            .with_info(ExporterInfo::new("0.1.0", "unknown"));

        let scrape = orchestrator.scrape().await;
        assert!(scrape.is_complete());
        assert_eq!(scrape.observations().len(), 3);
        assert_eq!(scrape.runs()[0].name, "stub");

        let registry = orchestrator.registry(&scrape);
        let mut buffer = String::new();
        Format::Prometheus.encode(&mut buffer, &registry).unwrap();
        let lines: Vec<_> = buffer.lines().collect();
        let expected_lines = [
            "# HELP test_gauge Test gauge.",
            "# TYPE test_gauge gauge",
            r#"test_gauge{id="a"} 0.0"#,
            r#"test_gauge{id="b"} 1.0"#,
            "test_timestamp_seconds 1700000000.0",
            "# TYPE scaleway_errors_total counter",
            r#"scaleway_errors_total{collector="stub"} 1"#,
            r#"scaleway_exporter_build_info{version="0.1.0",revision="unknown"} 1"#,
        ];
        for line in expected_lines {
            assert!(lines.contains(&line), "{lines:#?}");
        }
    }

    #[tokio::test]
    async fn label_values_are_escaped() {
        let orchestrator = Orchestrator::new(ErrorCounters::default(), Orchestrator::DEFAULT_TIMEOUT)
            .with_collector(StubCollector::new("stub", &["a \"b\" \\ c\nd"]));
        let scrape = orchestrator.scrape().await;
        let registry = orchestrator.registry(&scrape);

        for format in [Format::Prometheus, Format::OpenMetrics] {
            let mut buffer = String::new();
            format.encode(&mut buffer, &registry).unwrap();
            let lines: Vec<_> = buffer.lines().collect();
            assert!(
                lines.contains(&r#"test_gauge{id="a \"b\" \\ c\nd"} 0.0"#),
                "{lines:#?}"
            );
            assert!(!lines.iter().any(|line| line.starts_with("d\"")), "{lines:#?}");
        }
    }

    #[tokio::test]
    async fn described_gauges_are_exported_without_observations() {
        let orchestrator = Orchestrator::new(ErrorCounters::default(), Orchestrator::DEFAULT_TIMEOUT)
            .with_collector(StubCollector::new("stub", &[]));
        let registry = orchestrator.registry(&Scrape::default());
        let mut buffer = String::new();
        Format::OpenMetrics.encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("# TYPE test_gauge gauge"), "{buffer}");
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_collector_is_dropped_after_deadline() {
        let timeout = Duration::from_secs(5);
        let hanging = StubCollector {
            hang_for: Some(Duration::from_secs(3_600)),
            ..StubCollector::new("hanging", &["a"])
        };
        let orchestrator = Orchestrator::new(ErrorCounters::default(), timeout)
            .with_collector(hanging)
            .with_collector(StubCollector::new("fast", &["b"]));

        let started_at = Instant::now();
        let scrape = orchestrator.scrape().await;
        assert_eq!(started_at.elapsed(), timeout + DEADLINE_GRACE);
        assert!(!scrape.is_complete());
        assert!(!scrape.runs()[0].completed);
        assert!(scrape.runs()[1].completed);

        // Observations emitted before the deadline are retained, each exactly once.
        let mut ids: Vec<_> = scrape
            .observations()
            .iter()
            .filter_map(|observation| observation.label("id"))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, ["a", "b"]);
        let timestamps = scrape
            .observations()
            .iter()
            .filter(|observation| observation.descriptor().name == "test_timestamp_seconds")
            .count();
        assert_eq!(timestamps, 1);
    }
}
