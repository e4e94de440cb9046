//! HTTP server exposing Scaleway metrics to Prometheus.
//!
//! The server wraps an [`Orchestrator`](scaleway_collector::Orchestrator) from the
//! `scaleway-collector` crate. Each request to the metrics path triggers a scrape; the scraped
//! gauges are encoded together with error counters, exporter info and the exporter's own metrics
//! (`scaleway_exporter_scrape_duration_seconds` and `scaleway_exporter_scraped_size_bytes`).
//!
//! # Examples
//!
//! ```no_run
//! use scaleway_collector::{Collector, DatabaseFamily, ErrorCounters, Orchestrator, Region, ScalewayClient};
//! use scaleway_exporter::MetricsExporter;
//! use std::{net::Ipv4Addr, sync::Arc, time::Duration};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScalewayClient::new("secret-key")?;
//! let errors = ErrorCounters::default();
//! let database = Collector::new(DatabaseFamily::new(client), Region::all(), &errors);
//! let orchestrator = Orchestrator::new(errors, Duration::from_secs(5)).with_collector(database);
//!
//! let (shutdown_sender, shutdown) = tokio::sync::oneshot::channel::<()>();
//! MetricsExporter::new(Arc::new(orchestrator))
//!     .with_graceful_shutdown(async move {
//!         shutdown.await.ok();
//!     })
//!     .start((Ipv4Addr::UNSPECIFIED, 9503).into())
//!     .await?;
//! # drop(shutdown_sender);
//! # Ok(())
//! # }
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub use crate::exporter::{MetricsExporter, MetricsServer};

mod exporter;
mod metrics;
