//! Prometheus exporter for Scaleway managed resources.

use std::{process, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use scaleway_collector::{
    BillingCollector, BucketFamily, Collector, DatabaseFamily, ErrorCounters, ExporterInfo,
    LoadBalancerFamily, Orchestrator, RedisFamily, Region, S3BucketLister, ScalewayClient, Zone,
};
use scaleway_exporter::MetricsExporter;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use crate::config::Config;

mod config;

const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Revision the binary was built from, set by the build environment.
const REVISION: &str = match option_env!("SCALEWAY_EXPORTER_REVISION") {
    Some(revision) => revision,
    None => "unknown",
};

fn init_tracing(debug: bool) {
    let default_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let credentials = config.credentials()?;
    if config.region.is_none() {
        tracing::info!("Scaleway region is not set, scanning all regions");
    }
    let regions = config.regions();
    let zones: Vec<Zone> = regions.iter().flat_map(Region::zones).collect();

    let client = ScalewayClient::new(credentials.secret_key)
        .context("Scaleway client initialization error")?
        .with_base_url(config.api_url.as_str());
    let errors = ErrorCounters::default();
    let mut orchestrator = Orchestrator::new(errors.clone(), config.timeout());

    if !config.disable_database_collector {
        let family = DatabaseFamily::new(client.clone());
        orchestrator = orchestrator.with_collector(Collector::new(family, regions.clone(), &errors));
    }
    if !config.disable_bucket_collector {
        let lister =
            S3BucketLister::new(credentials.access_key, credentials.secret_key, &regions);
        let family = BucketFamily::new(client.clone(), lister);
        orchestrator = orchestrator.with_collector(Collector::new(family, regions.clone(), &errors));
    }
    if !config.disable_loadbalancer_collector {
        let family = LoadBalancerFamily::new(client.clone());
        orchestrator = orchestrator.with_collector(Collector::new(family, zones.clone(), &errors));
    }
    if !config.disable_redis_collector {
        let family = RedisFamily::new(client.clone());
        orchestrator = orchestrator.with_collector(Collector::new(family, zones, &errors));
    }
    if !config.disable_billing_collector {
        if let Some(organization_id) = &config.organization_id {
            let collector = BillingCollector::new(client, organization_id.as_str(), &errors);
            orchestrator = orchestrator.with_collector(collector);
        } else {
            tracing::info!("Scaleway organization ID is not set, billing collector is disabled");
        }
    }
    Ok(orchestrator.with_info(ExporterInfo::new(VERSION, REVISION)))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    tracing::info!(
        version = VERSION,
        revision = REVISION,
        "Starting scaleway_exporter"
    );

    let exporter = MetricsExporter::new(Arc::new(orchestrator))
        .with_format(config.format.into())
        .with_metrics_path(&config.web_path)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        });
    exporter
        .start(config.web_addr)
        .await
        .with_context(|| format!("Failed serving metrics on `{}`", config.web_addr))
}

#[tokio::main]
async fn main() {
    let config = Config::parse();
    init_tracing(config.debug);

    if let Err(err) = run(config).await {
        tracing::error!("{err:#}");
        process::exit(1);
    }
}
