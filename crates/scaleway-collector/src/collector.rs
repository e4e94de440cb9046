//! Generic collector driving inventory and metric fetches for a resource family.

use std::fmt;

use async_trait::async_trait;
use futures::future;
use tokio::sync::mpsc;

use crate::{
    descriptors::{Descriptor, Observation, Resolution, SeriesRegistry},
    errors::{ErrorCounter, ErrorCounters},
    model::{Resource, TimeSeries, Window},
    reducer::latest_value,
    upstream::{ScrapeContext, UpstreamError},
};

/// Output of collectors. Can be cloned and written to from any number of concurrent tasks.
#[derive(Debug, Clone)]
pub struct ObservationSink {
    sender: mpsc::UnboundedSender<Observation>,
}

impl ObservationSink {
    /// Creates a sink together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Observation>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Emits an observation. Observations emitted after the receiver is dropped are discarded.
    pub fn emit(&self, observation: Observation) {
        self.sender.send(observation).ok();
    }
}

/// Collector as seen by the scrape orchestrator.
#[async_trait]
pub trait Collect: fmt::Debug + Send + Sync {
    /// Collector name used as the label of the error counter.
    fn name(&self) -> &'static str;

    /// Returns all descriptors this collector can ever emit.
    fn describe(&self) -> Vec<&'static Descriptor>;

    /// Performs a full scrape, writing observations to `sink`. Recoverable failures are
    /// absorbed: they are logged and counted, but never returned.
    async fn collect(&self, sink: &ObservationSink, cx: &ScrapeContext);
}

/// Per-family part of a [`Collector`]: how resources are listed, how their series are
/// fetched and reported.
#[async_trait]
pub trait ResourceFamily: fmt::Debug + Send + Sync + 'static {
    /// Family name, e.g. `database`.
    const NAME: &'static str;
    /// Metric queries issued for each resource.
    const QUERIES: &'static [Self::Query];

    /// Partition (region or zone) resources are listed in.
    type Partition: Clone + fmt::Display + Send + Sync + 'static;
    /// Listed resource.
    type Resource: Resource + fmt::Debug;
    /// Single metric fetch for a resource. Families fetching all series at once use `()`.
    type Query: Copy + fmt::Debug + Send + Sync + 'static;

    /// Builds the registry of upstream series reported by this family.
    fn series_registry(&self) -> SeriesRegistry<Self::Resource>;

    /// Returns the descriptor of the liveness gauge, if the family reports one.
    fn liveness_descriptor(&self) -> Option<&'static Descriptor> {
        None
    }

    /// Returns the liveness observation for a freshly listed `resource`.
    fn liveness(&self, resource: &Self::Resource) -> Option<Observation> {
        let _ = resource;
        None
    }

    /// Lists all resources in `partition`, following pagination.
    async fn list(
        &self,
        partition: &Self::Partition,
        cx: &ScrapeContext,
    ) -> Result<Vec<Self::Resource>, UpstreamError>;

    /// Fetches metric series of `resource` for the `window`.
    async fn fetch_series(
        &self,
        resource: &Self::Resource,
        query: Self::Query,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError>;
}

/// Collector for a resource family.
///
/// Partitions are scanned concurrently; within a partition, all resources are processed
/// concurrently. A failure only affects the smallest unit it concerns (a partition, a resource
/// or a single series), and is reported via logs and the error counter of the family.
pub struct Collector<F: ResourceFamily> {
    family: F,
    partitions: Vec<F::Partition>,
    registry: SeriesRegistry<F::Resource>,
    errors: ErrorCounter,
}

impl<F: ResourceFamily> fmt::Debug for Collector<F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let partitions: Vec<_> = self.partitions.iter().map(ToString::to_string).collect();
        formatter
            .debug_struct("Collector")
            .field("family", &self.family)
            .field("partitions", &partitions)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<F: ResourceFamily> Collector<F> {
    /// Creates a collector scanning the specified partitions. The error counter of the family
    /// is registered in `errors` right away.
    pub fn new(family: F, partitions: Vec<F::Partition>, errors: &ErrorCounters) -> Self {
        let registry = family.series_registry();
        let errors = errors.register(F::NAME);
        tracing::info!(collector = F::NAME, "Collector enabled");
        Self {
            family,
            partitions,
            registry,
            errors,
        }
    }

    /// Returns the scanned partitions.
    pub fn partitions(&self) -> &[F::Partition] {
        &self.partitions
    }

    async fn collect_partition(
        &self,
        partition: &F::Partition,
        sink: &ObservationSink,
        cx: &ScrapeContext,
    ) {
        let resources = match self.family.list(partition, cx).await {
            Ok(resources) => resources,
            Err(err) if err.is_not_implemented() => {
                tracing::debug!(
                    collector = F::NAME,
                    %partition,
                    "Partition is not supported, skipping"
                );
                return;
            }
            Err(err) => {
                self.errors.inc();
                tracing::warn!(
                    collector = F::NAME,
                    %partition,
                    %err,
                    "Can't fetch the list of resources"
                );
                return;
            }
        };
        tracing::debug!(
            collector = F::NAME,
            %partition,
            "Found {} resources",
            resources.len()
        );

        let tasks = resources
            .iter()
            .map(|resource| self.collect_resource(partition, resource, sink, cx));
        future::join_all(tasks).await;
    }

    async fn collect_resource(
        &self,
        partition: &F::Partition,
        resource: &F::Resource,
        sink: &ObservationSink,
        cx: &ScrapeContext,
    ) {
        if let Some(observation) = self.family.liveness(resource) {
            sink.emit(observation);
        }
        let tasks = F::QUERIES
            .iter()
            .map(|&query| self.collect_query(partition, resource, query, sink, cx));
        future::join_all(tasks).await;
    }

    async fn collect_query(
        &self,
        partition: &F::Partition,
        resource: &F::Resource,
        query: F::Query,
        sink: &ObservationSink,
        cx: &ScrapeContext,
    ) {
        let window = Window::trailing(Window::DEFAULT_LENGTH);
        let all_series = match self.family.fetch_series(resource, query, &window, cx).await {
            Ok(series) => series,
            Err(err) => {
                self.errors.inc();
                tracing::warn!(
                    collector = F::NAME,
                    %partition,
                    id = resource.id(),
                    name = resource.name(),
                    ?query,
                    %err,
                    "Can't fetch metrics for the resource"
                );
                return;
            }
        };

        for series in &all_series {
            self.report_series(partition, resource, series, sink);
        }
    }

    fn report_series(
        &self,
        partition: &F::Partition,
        resource: &F::Resource,
        series: &TimeSeries,
        sink: &ObservationSink,
    ) {
        let mapping = match self.registry.resolve(&series.name) {
            Resolution::Mapped(mapping) => mapping,
            Resolution::Ignored => return,
            Resolution::Unknown => {
                tracing::debug!(
                    collector = F::NAME,
                    %partition,
                    id = resource.id(),
                    metric = %series.name,
                    "Unmapped upstream metric"
                );
                return;
            }
        };

        if let Some(value) = latest_value(&series.points) {
            sink.emit(mapping.observe(resource, series, value));
        } else {
            self.errors.inc();
            tracing::warn!(
                collector = F::NAME,
                %partition,
                id = resource.id(),
                name = resource.name(),
                metric = %series.name,
                "No data were returned for the metric"
            );
        }
    }
}

#[async_trait]
impl<F: ResourceFamily> Collect for Collector<F> {
    fn name(&self) -> &'static str {
        F::NAME
    }

    fn describe(&self) -> Vec<&'static Descriptor> {
        let liveness = self.family.liveness_descriptor();
        liveness
            .into_iter()
            .chain(self.registry.descriptors().iter().copied())
            .collect()
    }

    async fn collect(&self, sink: &ObservationSink, cx: &ScrapeContext) {
        let tasks = self
            .partitions
            .iter()
            .map(|partition| self.collect_partition(partition, sink, cx));
        future::join_all(tasks).await;
    }
}
