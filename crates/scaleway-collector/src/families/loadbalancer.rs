//! Load balancers.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    collector::ResourceFamily,
    descriptors::{Descriptor, GaugeDescriptor, Observation, SeriesRegistry},
    label_set,
    model::{Liveness, Resource, SeriesResponse, TimeSeries, Window, Zone},
    upstream::{Paginated, ScalewayClient, ScrapeContext, UpstreamError},
};

label_set! {
    /// Labels of all load balancer gauges.
    pub struct LoadBalancerLabels {
        id => "id",
        name => "name",
        zone => "zone",
        lb_type => "type",
    }
}

static UP: GaugeDescriptor<LoadBalancerLabels> = GaugeDescriptor::new(
    "scaleway_loadbalancer_up",
    "If 1 the loadbalancer is up and running, 0.5 when migrating, 0 otherwise",
);
static NETWORK_RECEIVE: GaugeDescriptor<LoadBalancerLabels> = GaugeDescriptor::new(
    "scaleway_loadbalancer_network_receive_bits_sec",
    "LoadBalancer's received traffic in bits per second",
);
static NETWORK_TRANSMIT: GaugeDescriptor<LoadBalancerLabels> = GaugeDescriptor::new(
    "scaleway_loadbalancer_network_transmit_bits_sec",
    "LoadBalancer's transmitted traffic in bits per second",
);
static CONNECTIONS: GaugeDescriptor<LoadBalancerLabels> = GaugeDescriptor::new(
    "scaleway_loadbalancer_total_connections",
    "LoadBalancer's current connection rate per second",
);
static NEW_CONNECTIONS: GaugeDescriptor<LoadBalancerLabels> = GaugeDescriptor::new(
    "scaleway_loadbalancer_new_connection_rate_sec",
    "LoadBalancer's new connection rate per second",
);

/// Status of a load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum LoadBalancerStatus {
    Ready,
    Pending,
    Stopped,
    Error,
    Locked,
    Migrating,
    ToCreate,
    Creating,
    ToDelete,
    Deleting,
    #[default]
    #[serde(other)]
    Unknown,
}

impl LoadBalancerStatus {
    /// Maps the status to the liveness scale.
    pub fn liveness(self) -> Liveness {
        match self {
            Self::Ready => Liveness::Healthy,
            Self::Migrating | Self::Creating | Self::ToDelete | Self::Deleting => {
                Liveness::Degraded
            }
            Self::Pending
            | Self::Stopped
            | Self::Error
            | Self::Locked
            | Self::ToCreate
            | Self::Unknown => Liveness::Down,
        }
    }
}

/// Load balancer.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancer {
    /// Load balancer ID.
    pub id: String,
    /// Load balancer name.
    pub name: String,
    /// Zone the load balancer is deployed in.
    pub zone: Zone,
    /// Commercial offer type, e.g. `lb-s`.
    #[serde(rename = "type", default)]
    pub lb_type: String,
    /// Current status.
    #[serde(default)]
    pub status: LoadBalancerStatus,
}

impl Resource for LoadBalancer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl LoadBalancer {
    fn labels(&self) -> LoadBalancerLabels {
        LoadBalancerLabels {
            id: self.id.clone(),
            name: self.name.clone(),
            zone: self.zone.to_string(),
            lb_type: self.lb_type.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoadBalancerList {
    #[serde(default)]
    lbs: Vec<LoadBalancer>,
    #[serde(default)]
    total_count: u64,
}

impl Paginated for LoadBalancerList {
    type Item = LoadBalancer;

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn into_items(self) -> Vec<LoadBalancer> {
        self.lbs
    }
}

/// Load balancer API calls used by the collector.
#[async_trait]
pub trait LoadBalancerApi: fmt::Debug + Send + Sync + 'static {
    /// Lists all load balancers in a zone.
    async fn list_load_balancers(
        &self,
        zone: &Zone,
        cx: &ScrapeContext,
    ) -> Result<Vec<LoadBalancer>, UpstreamError>;

    /// Fetches metric series of a load balancer.
    async fn load_balancer_metrics(
        &self,
        lb: &LoadBalancer,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError>;
}

#[async_trait]
impl LoadBalancerApi for ScalewayClient {
    async fn list_load_balancers(
        &self,
        zone: &Zone,
        cx: &ScrapeContext,
    ) -> Result<Vec<LoadBalancer>, UpstreamError> {
        let path = format!("/lb/v1/zones/{zone}/lbs");
        self.list_all::<LoadBalancerList>(&path, &[], cx).await
    }

    async fn load_balancer_metrics(
        &self,
        lb: &LoadBalancer,
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError> {
        // Metrics are only exposed by the private API.
        let path = format!("/lb-private/v1/zones/{}/lbs/{}/metrics", lb.zone, lb.id);
        let response: SeriesResponse = self.get(&path, &window.query(), cx).await?;
        Ok(response.timeseries)
    }
}

/// Load balancer family, partitioned by zone.
#[derive(Debug)]
pub struct LoadBalancerFamily<A = ScalewayClient> {
    api: A,
}

impl<A: LoadBalancerApi> LoadBalancerFamily<A> {
    /// Creates a family using the specified API.
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

fn series_labels(lb: &LoadBalancer, _: &TimeSeries) -> LoadBalancerLabels {
    lb.labels()
}

#[async_trait]
impl<A: LoadBalancerApi> ResourceFamily for LoadBalancerFamily<A> {
    const NAME: &'static str = "loadbalancer";
    const QUERIES: &'static [()] = &[()];

    type Partition = Zone;
    type Resource = LoadBalancer;
    type Query = ();

    fn series_registry(&self) -> SeriesRegistry<LoadBalancer> {
        SeriesRegistry::new()
            .map("node_network_receive_bits_sec", &NETWORK_RECEIVE, series_labels)
            .map("node_network_transmit_bits_sec", &NETWORK_TRANSMIT, series_labels)
            .map("current_connection_rate_sec", &CONNECTIONS, series_labels)
            .map("current_new_connection_rate_sec", &NEW_CONNECTIONS, series_labels)
            .ignore("server_status")
    }

    fn liveness_descriptor(&self) -> Option<&'static Descriptor> {
        Some(UP.descriptor())
    }

    fn liveness(&self, lb: &LoadBalancer) -> Option<Observation> {
        Some(UP.observe(lb.labels(), lb.status.liveness().value()))
    }

    async fn list(&self, zone: &Zone, cx: &ScrapeContext) -> Result<Vec<LoadBalancer>, UpstreamError> {
        self.api.list_load_balancers(zone, cx).await
    }

    async fn fetch_series(
        &self,
        lb: &LoadBalancer,
        _: (),
        window: &Window,
        cx: &ScrapeContext,
    ) -> Result<Vec<TimeSeries>, UpstreamError> {
        self.api.load_balancer_metrics(lb, window, cx).await
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::descriptors::Resolution;

    #[derive(Debug)]
    struct NoApi;

    #[async_trait]
    impl LoadBalancerApi for NoApi {
        async fn list_load_balancers(
            &self,
            _: &Zone,
            _: &ScrapeContext,
        ) -> Result<Vec<LoadBalancer>, UpstreamError> {
            Err(UpstreamError::NotImplemented)
        }

        async fn load_balancer_metrics(
            &self,
            _: &LoadBalancer,
            _: &Window,
            _: &ScrapeContext,
        ) -> Result<Vec<TimeSeries>, UpstreamError> {
            Ok(vec![])
        }
    }

    #[test]
    fn status_tiers() {
        use LoadBalancerStatus::*;

        assert_eq!(Ready.liveness().value(), 1.0);
        for status in [Migrating, Creating, ToDelete, Deleting] {
            assert_eq!(status.liveness().value(), 0.5, "{status:?}");
        }
        for status in [Pending, Stopped, Error, Locked, ToCreate, Unknown] {
            assert_eq!(status.liveness().value(), 0.0, "{status:?}");
        }
    }

    #[test]
    fn deserializing_load_balancer() {
        let raw = r#"{
            "id": "c1f3",
            "name": "ingress",
            "zone": "fr-par-1",
            "type": "lb-s",
            "status": "to_delete",
            "ip": [{ "ip_address": "51.15.0.1" }]
        }"#;
        let lb: LoadBalancer = serde_json::from_str(raw).unwrap();
        assert_eq!(lb.lb_type, "lb-s");
        assert_eq!(lb.status, LoadBalancerStatus::ToDelete);

        let labels: Vec<_> = LoadBalancerFamily::new(NoApi)
            .liveness(&lb)
            .unwrap()
            .labels()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        assert_eq!(labels, ["id=c1f3", "name=ingress", "zone=fr-par-1", "type=lb-s"]);
    }

    #[test]
    fn server_status_is_ignored() {
        let registry = LoadBalancerFamily::new(NoApi).series_registry();
        assert_matches!(registry.resolve("server_status"), Resolution::Ignored);
        assert_matches!(
            registry.resolve("current_connection_rate_sec"),
            Resolution::Mapped(mapping)
                if mapping.descriptor().name == "scaleway_loadbalancer_total_connections"
        );
        assert_eq!(registry.descriptors().len(), 4);
    }
}
