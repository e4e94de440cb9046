//! Collectors turning Scaleway resource inventories and metric series into Prometheus gauges.
//!
//! # Overview
//!
//! - Each gauge is declared as a static [`GaugeDescriptor`] parameterized by a typed label set
//!   (see [`label_set!`]). Metric and label names are validated at compile time.
//! - A [`ResourceFamily`] describes how resources of a certain kind (database instances,
//!   load balancers, cache clusters, object storage buckets) are listed in a region or zone,
//!   and how upstream metric series map to gauges via a [`SeriesRegistry`]. The generic
//!   [`Collector`] turns a family into a [`Collect`] implementation which scans all partitions
//!   concurrently.
//! - Collectors not fitting this shape (e.g., [`BillingCollector`]) implement [`Collect`] directly.
//! - An [`Orchestrator`] runs all collectors on each scrape under a shared deadline and produces
//!   a `prometheus-client` registry, which can be encoded in one of the supported [`Format`]s.
//! - Failures never abort a scrape. They are logged using `tracing` and counted in the
//!   `scaleway_errors_total` counter labeled by the collector name.
//!
//! # Examples
//!
//! ```
//! use scaleway_collector::{
//!     Collector, DatabaseFamily, ErrorCounters, Format, Orchestrator, Region, ScalewayClient,
//! };
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScalewayClient::new("secret-key")?;
//! let errors = ErrorCounters::default();
//! let database = Collector::new(DatabaseFamily::new(client), Region::all(), &errors);
//! let orchestrator = Orchestrator::new(errors, Duration::from_secs(5)).with_collector(database);
//!
//! // Without a scrape, only metric metadata and error counters are exported.
//! let registry = orchestrator.registry(&Default::default());
//! let mut buffer = String::new();
//! Format::Prometheus.encode(&mut buffer, &registry)?;
//! assert!(buffer.contains("# TYPE scaleway_database_up gauge"));
//! assert!(buffer.contains(r#"scaleway_errors_total{collector="database"} 0"#));
//! # Ok(())
//! # }
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub use crate::{
    billing::{BillingApi, BillingCollector},
    collector::{Collect, Collector, ObservationSink, ResourceFamily},
    descriptors::{Descriptor, GaugeDescriptor, Observation, Resolution, SeriesRegistry},
    errors::{ErrorCounter, ErrorCounters},
    families::{BucketFamily, DatabaseFamily, LoadBalancerFamily, RedisFamily},
    format::Format,
    info::ExporterInfo,
    model::{Liveness, Point, Region, Resource, TimeSeries, Window, Zone},
    orchestrator::{CollectorRun, Orchestrator, Scrape},
    reducer::latest_value,
    upstream::{S3BucketLister, ScalewayClient, ScrapeContext, UpstreamError},
};

pub mod billing;
mod collector;
pub mod descriptors;
mod errors;
pub mod families;
mod format;
mod info;
pub mod labels;
mod model;
mod orchestrator;
mod reducer;
pub mod upstream;
pub mod validation;
