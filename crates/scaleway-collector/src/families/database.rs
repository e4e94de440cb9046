//! Managed database instances.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    collector::ResourceFamily,
    descriptors::{Descriptor, GaugeDescriptor, Observation, SeriesRegistry},
    label_set,
    labels::NodeLabels,
    model::{Liveness, Region, Resource, SeriesResponse, TimeSeries, Window},
    upstream::{Paginated, ScalewayClient, ScrapeContext, UpstreamError},
};

label_set! {
    /// Labels of the database liveness gauge.
    pub struct DatabaseLabels {
        id => "id",
        name => "name",
        region => "region",
        engine => "engine",
        node_type => "type",
    }
}

static UP: GaugeDescriptor<DatabaseLabels> = GaugeDescriptor::new(
    "scaleway_database_up",
    "If 1 the database is up and running, 0.5 in autohealing, 0 otherwise",
);
static CPU_USAGE: GaugeDescriptor<NodeLabels> = GaugeDescriptor::new(
    "scaleway_database_cpu_usage_percent",
    "Database's CPUs percentage usage",
);
static MEMORY_USAGE: GaugeDescriptor<NodeLabels> = GaugeDescriptor::new(
    "scaleway_database_memory_usage_percent",
    "Database's memory percentage usage",
);
static CONNECTIONS: GaugeDescriptor<NodeLabels> = GaugeDescriptor::new(
    "scaleway_database_total_connections",
    "Database's connection count",
);
static DISK_USAGE: GaugeDescriptor<NodeLabels> = GaugeDescriptor::new(
    "scaleway_database_disk_usage_percent",
    "Database's disk percentage usage",
);

/// Status of a database instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum InstanceStatus {
    Ready,
    Provisioning,
    Configuring,
    Deleting,
    Error,
    Autohealing,
    Locked,
    Initializing,
    DiskFull,
    Backuping,
    Snapshotting,
    Restarting,
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    /// Maps the status to the liveness scale.
    pub fn liveness(self) -> Liveness {
        match self {
            Self::Ready | Self::Backuping => Liveness::Healthy,
            Self::Autohealing
            | Self::Provisioning
            | Self::Configuring
            | Self::Initializing
            | Self::Snapshotting
            | Self::Restarting
            | Self::Deleting => Liveness::Degraded,
            Self::Error | Self::Locked | Self::DiskFull | Self::Unknown => Liveness::Down,
        }
    }
}

/// Managed database instance.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInstance {
    /// Instance ID.
    pub id: String,
    /// Instance name.
    pub name: String,
    /// Region the instance is deployed in.
    pub region: Region,
    /// Database engine, e.g. `PostgreSQL-15`.
    #[serde(default)]
    pub engine: String,
    /// Node type, e.g. `db-dev-s`.
    #[serde(default)]
    pub node_type: String,
    /// Current status.
    #[serde(default)]
    pub status: InstanceStatus,
}

impl Resource for DatabaseInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    instances: Vec<DatabaseInstance>,
    #[serde(default)]
    total_count: u64,
}

impl Paginated for InstanceList {
    type Item = DatabaseInstance;

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn into_items(self) -> Vec<DatabaseInstance> {
        self.instances
    }
}

/// Database API calls used by the collector.
#[async_trait]
pub trait DatabaseApi: fmt::Debug + Send + Sync + 'static {
    /// Lists all instances in a region.
    async fn list_instances(
        &self,
        region: &Region,
        cx: &ScrapeContext,
    ) -> Result<Vec<DatabaseInstance>, UpstreamError>;

    /// Fetches metric series of an instance.
    async fn instance_metrics(
        &self,
        instance: &DatabaseInstance,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError>;
}

#[async_trait]
impl DatabaseApi for ScalewayClient {
    async fn list_instances(
        &self,
        region: &Region,
        cx: &ScrapeContext,
    ) -> Result<Vec<DatabaseInstance>, UpstreamError> {
        let path = format!("/rdb/v1/regions/{region}/instances");
        self.list_all::<InstanceList>(&path, &[], cx).await
    }

    async fn instance_metrics(
        &self,
        instance: &DatabaseInstance,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError> {
        let path = format!(
            "/rdb/v1/regions/{}/instances/{}/metrics",
            instance.region, instance.id
        );
        let response: SeriesResponse = self.get(&path, &window.query(), cx).await?;
        Ok(response.timeseries)
    }
}

/// Managed database family, partitioned by region.
#[derive(Debug)]
pub struct DatabaseFamily<A = ScalewayClient> {
    api: A,
}

impl<A: DatabaseApi> DatabaseFamily<A> {
    /// Creates a family using the specified API.
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

fn node_labels(instance: &DatabaseInstance, series: &TimeSeries) -> NodeLabels {
    NodeLabels {
        id: instance.id.clone(),
        name: instance.name.clone(),
        node: series.metadata("node").to_owned(),
    }
}

#[async_trait]
impl<A: DatabaseApi> ResourceFamily for DatabaseFamily<A> {
    const NAME: &'static str = "database";
    const QUERIES: &'static [()] = &[()];

    type Partition = Region;
    type Resource = DatabaseInstance;
    type Query = ();

    fn series_registry(&self) -> SeriesRegistry<DatabaseInstance> {
        SeriesRegistry::new()
            .map("cpu_usage_percent", &CPU_USAGE, node_labels)
            .map("mem_usage_percent", &MEMORY_USAGE, node_labels)
            .map("total_connections", &CONNECTIONS, node_labels)
            .map("disk_usage_percent", &DISK_USAGE, node_labels)
    }

    fn liveness_descriptor(&self) -> Option<&'static Descriptor> {
        Some(UP.descriptor())
    }

    fn liveness(&self, instance: &DatabaseInstance) -> Option<Observation> {
        let labels = DatabaseLabels {
            id: instance.id.clone(),
            name: instance.name.clone(),
            region: instance.region.to_string(),
            engine: instance.engine.clone(),
            node_type: instance.node_type.clone(),
        };
        Some(UP.observe(labels, instance.status.liveness().value()))
    }

    async fn list(
        &self,
        region: &Region,
        cx: &ScrapeContext,
    ) -> Result<Vec<DatabaseInstance>, UpstreamError> {
        self.api.list_instances(region, cx).await
    }

    async fn fetch_series(
        &self,
        instance: &DatabaseInstance,
        _: (),
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError> {
        self.api.instance_metrics(instance, window, cx).await
    }
}
