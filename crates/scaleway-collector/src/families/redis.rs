//! Managed Redis clusters.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    collector::ResourceFamily,
    descriptors::{Descriptor, GaugeDescriptor, Observation, SeriesRegistry},
    label_set,
    labels::NodeLabels,
    model::{Liveness, Resource, SeriesResponse, TimeSeries, Window, Zone},
    upstream::{Paginated, ScalewayClient, ScrapeContext, UpstreamError},
};

label_set! {
    /// Labels of the cluster liveness gauge.
    pub struct ClusterLabels {
        id => "id",
        name => "name",
        zone => "zone",
        node_type => "node_type",
    }
}

static UP: GaugeDescriptor<ClusterLabels> = GaugeDescriptor::new(
    "scaleway_redis_up",
    "If 1 the redis cluster is up and running, 0.5 while it's being provisioned or healed, 0 otherwise",
);
static CPU_USAGE: GaugeDescriptor<NodeLabels> = GaugeDescriptor::new(
    "scaleway_redis_cpu_usage_percent",
    "The redis node CPU usage percentage",
);
static MEMORY_USAGE: GaugeDescriptor<NodeLabels> = GaugeDescriptor::new(
    "scaleway_redis_memory_usage_percent",
    "The redis node memory usage percentage",
);
static DB_MEMORY_USAGE: GaugeDescriptor<NodeLabels> = GaugeDescriptor::new(
    "scaleway_redis_db_memory_usage_percent",
    "The redis node database memory usage percentage",
);

/// Status of a Redis cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ClusterStatus {
    Ready,
    Provisioning,
    Configuring,
    Deleting,
    Error,
    Autohealing,
    Locked,
    Suspended,
    Initializing,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ClusterStatus {
    /// Maps the status to the liveness scale.
    pub fn liveness(self) -> Liveness {
        match self {
            Self::Ready => Liveness::Healthy,
            Self::Provisioning
            | Self::Configuring
            | Self::Initializing
            | Self::Autohealing
            | Self::Deleting => Liveness::Degraded,
            Self::Error | Self::Locked | Self::Suspended | Self::Unknown => Liveness::Down,
        }
    }
}

/// Redis cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct Cluster {
    /// Cluster ID.
    pub id: String,
    /// Cluster name.
    pub name: String,
    /// Zone the cluster is deployed in.
    pub zone: Zone,
    /// Node type, e.g. `RED1-MICRO`.
    #[serde(default)]
    pub node_type: String,
    /// Current status.
    #[serde(default)]
    pub status: ClusterStatus,
}

impl Resource for Cluster {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Deserialize)]
struct ClusterList {
    #[serde(default)]
    clusters: Vec<Cluster>,
    #[serde(default)]
    total_count: u64,
}

impl Paginated for ClusterList {
    type Item = Cluster;

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn into_items(self) -> Vec<Cluster> {
        self.clusters
    }
}

/// Redis API calls used by the collector.
#[async_trait]
pub trait RedisApi: fmt::Debug + Send + Sync + 'static {
    /// Lists all clusters in a zone.
    async fn list_clusters(&self, zone: &Zone, cx: &ScrapeContext) -> Result<Vec<Cluster>, UpstreamError>;

    /// Fetches metric series of a cluster.
    async fn cluster_metrics(
        &self,
        cluster: &Cluster,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError>;
}

#[async_trait]
impl RedisApi for ScalewayClient {
    async fn list_clusters(&self, zone: &Zone, cx: &ScrapeContext) -> Result<Vec<Cluster>, UpstreamError> {
        let path = format!("/redis/v1/zones/{zone}/clusters");
        self.list_all::<ClusterList>(&path, &[], cx).await
    }

    async fn cluster_metrics(
        &self,
        cluster: &Cluster,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError> {
        let path = format!(
            "/redis/v1/zones/{}/clusters/{}/metrics",
            cluster.zone, cluster.id
        );
        // The Redis API names window bounds differently from other products.
        let query = [
            ("start_at", window.start.to_rfc3339()),
            ("end_at", window.end.to_rfc3339()),
        ];
        let response: SeriesResponse = self.get(&path, &query, cx).await?;
        Ok(response.timeseries)
    }
}

/// Redis cluster family, partitioned by zone.
#[derive(Debug)]
pub struct RedisFamily<A = ScalewayClient> {
    api: A,
}

impl<A: RedisApi> RedisFamily<A> {
    /// Creates a family using the specified API.
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

fn node_labels(cluster: &Cluster, series: &TimeSeries) -> NodeLabels {
    NodeLabels {
        id: cluster.id.clone(),
        name: cluster.name.clone(),
        node: series.metadata("node").to_owned(),
    }
}

#[async_trait]
impl<A: RedisApi> ResourceFamily for RedisFamily<A> {
    const NAME: &'static str = "redis";
    const QUERIES: &'static [()] = &[()];

    type Partition = Zone;
    type Resource = Cluster;
    type Query = ();

    fn series_registry(&self) -> SeriesRegistry<Cluster> {
        SeriesRegistry::new()
            .map("cpu_usage_percent", &CPU_USAGE, node_labels)
            .map("mem_usage_percent", &MEMORY_USAGE, node_labels)
            .map("db_memory_usage_percent", &DB_MEMORY_USAGE, node_labels)
    }

    fn liveness_descriptor(&self) -> Option<&'static Descriptor> {
        Some(UP.descriptor())
    }

    fn liveness(&self, cluster: &Cluster) -> Option<Observation> {
        let labels = ClusterLabels {
            id: cluster.id.clone(),
            name: cluster.name.clone(),
            zone: cluster.zone.to_string(),
            node_type: cluster.node_type.clone(),
        };
        Some(UP.observe(labels, cluster.status.liveness().value()))
    }

    async fn list(&self, zone: &Zone, cx: &ScrapeContext) -> Result<Vec<Cluster>, UpstreamError> {
        self.api.list_clusters(zone, cx).await
    }

    async fn fetch_series(
        &self,
        cluster: &Cluster,
        _: (),
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError> {
        self.api.cluster_metrics(cluster, window, cx).await
    }
}
