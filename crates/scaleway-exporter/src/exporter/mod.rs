//! `MetricsExporter` and closely related types.

use std::{
    convert::Infallible,
    fmt,
    future::{self, Future},
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    time::Instant,
};

use hyper::{header, server::conn::http1, service::service_fn, Response, StatusCode};
use hyper_util::rt::TokioIo;
use scaleway_collector::{Format, Orchestrator};
use tokio::{io, net::TcpListener, sync::watch};

use crate::metrics::ExporterMetrics;

#[cfg(test)]
mod tests;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone)]
struct MetricsExporterInner {
    orchestrator: Arc<Orchestrator>,
    format: Format,
    metrics_path: Arc<str>,
    metrics: ExporterMetrics,
}

impl MetricsExporterInner {
    async fn render_body(&self) -> String {
        let started_at = Instant::now();
        let scrape = self.orchestrator.scrape().await;
        for run in scrape.runs() {
            self.metrics.observe_scrape_duration(run.name, run.duration);
        }

        let mut registry = self.orchestrator.registry(&scrape);
        self.metrics.register_in(&mut registry);
        let mut buffer = String::with_capacity(1_024);
        self.format.encode(&mut buffer, &registry).unwrap();
        // ^ `unwrap()` is safe; writing to a string never fails.

        let latency = started_at.elapsed();
        let scraped_size = buffer.len();
        self.metrics.observe_scraped_size(scraped_size);
        tracing::debug!(
            latency_sec = latency.as_secs_f64(),
            scraped_size,
            observations = scrape.observations().len(),
            complete = scrape.is_complete(),
            "Scraped metrics in {latency:?} (scraped size: {scraped_size}B)"
        );
        buffer
    }

    fn landing_page(&self) -> String {
        let metrics_path = &self.metrics_path;
        format!(
            "<html>\n\
             <head><title>Scaleway Exporter</title></head>\n\
             <body>\n\
             <h1>Scaleway Exporter</h1>\n\
             <p><a href=\"{metrics_path}\">Metrics</a></p>\n\
             </body>\n\
             </html>\n"
        )
    }

    async fn render(&self, path: &str) -> Response<String> {
        let (content_type, body) = if path == &*self.metrics_path {
            (self.format.content_type(), self.render_body().await)
        } else {
            (HTML_CONTENT_TYPE, self.landing_page())
        };
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .unwrap()
    }
}

/// Metrics exporter to Prometheus.
///
/// Each request to the metrics path triggers a scrape performed by the wrapped [`Orchestrator`].
/// Requests to other paths are answered with a landing page linking to the metrics path.
pub struct MetricsExporter<'a> {
    inner: MetricsExporterInner,
    shutdown_future: Pin<Box<dyn Future<Output = ()> + Send + 'a>>,
}

impl fmt::Debug for MetricsExporter<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricsExporter")
            .field("orchestrator", &self.inner.orchestrator)
            .field("format", &self.inner.format)
            .field("metrics_path", &self.inner.metrics_path)
            .finish_non_exhaustive()
    }
}

impl<'a> MetricsExporter<'a> {
    /// Default path metrics are served on.
    pub const DEFAULT_METRICS_PATH: &'static str = "/metrics";

    /// Creates an exporter based on the provided [`Orchestrator`].
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let collectors = orchestrator.collector_names();
        tracing::info!(
            "Created metrics exporter with {} collectors: {}",
            collectors.len(),
            collectors.join(", ")
        );
        Self {
            inner: MetricsExporterInner {
                orchestrator,
                format: Format::default(),
                metrics_path: Self::DEFAULT_METRICS_PATH.into(),
                metrics: ExporterMetrics::default(),
            },
            shutdown_future: Box::pin(future::pending()),
        }
    }

    /// Sets the export [`Format`]. By default, [`Format::Prometheus`] is used.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.inner.format = format;
        self
    }

    /// Sets the path metrics are served on.
    #[must_use]
    pub fn with_metrics_path(mut self, path: &str) -> Self {
        self.inner.metrics_path = path.into();
        self
    }

    /// Configures graceful shutdown for the exporter server.
    #[must_use]
    pub fn with_graceful_shutdown<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send + 'a,
    {
        self.shutdown_future = Box::pin(shutdown);
        self
    }

    /// Starts the server on the specified address. This future resolves when the server is shut down.
    ///
    /// The server will expose the following endpoints:
    ///
    /// - `GET` on the metrics path: scrapes metrics and serves them in the text format
    ///   configured using [`Self::with_format()`]
    /// - `GET` on any other path: serves an HTML landing page
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn start(self, bind_address: SocketAddr) -> io::Result<()> {
        let server = self.bind(bind_address).await?;
        tracing::info!(
            "Starting Prometheus exporter web server on {}",
            server.local_addr()
        );
        server.start().await?;
        tracing::info!("Prometheus metrics exporter server shut down");
        Ok(())
    }

    /// Creates an HTTP exporter server and binds it to the specified address.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn bind(mut self, bind_address: SocketAddr) -> io::Result<MetricsServer<'a>> {
        let listener = TcpListener::bind(bind_address).await?;
        let local_addr = listener.local_addr()?;
        let server = async move {
            let (started_shutdown_sender, started_shutdown) = watch::channel(());
            loop {
                let stream = tokio::select! {
                    res = listener.accept() => res?.0,
                    () = &mut self.shutdown_future => break,
                };

                let io = TokioIo::new(stream);
                let inner = self.inner.clone();
                let mut started_shutdown = started_shutdown.clone();
                tokio::spawn(async move {
                    let inner = &inner;
                    let conn = http1::Builder::new().serve_connection(
                        io,
                        service_fn(|req| async move {
                            Ok::<_, Infallible>(inner.render(req.uri().path()).await)
                        }),
                    );
                    tokio::pin!(conn);

                    let res = tokio::select! {
                        _ = started_shutdown.changed() => {
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                        res = conn.as_mut() => res,
                    };
                    if let Err(err) = res {
                        tracing::warn!(%err, "Error serving connection");
                    }
                });
            }

            tracing::info!("Stop signal received, Prometheus metrics exporter is shutting down");
            // Send the graceful shutdown signal to all alive connections.
            drop(started_shutdown);
            started_shutdown_sender.send_replace(());
            // Wait until all connections are dropped.
            started_shutdown_sender.closed().await;

            Ok(())
        };

        Ok(MetricsServer {
            server: Box::pin(server),
            local_addr,
        })
    }
}

/// Metrics server bound to a certain local address returned by [`MetricsExporter::bind()`].
///
/// Useful e.g. if you need to find out which port the server was bound to if the 0th port was specified.
#[must_use = "Server should be `start()`ed"]
pub struct MetricsServer<'a> {
    server: Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>,
    local_addr: SocketAddr,
}

impl fmt::Debug for MetricsServer<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricsServer")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl MetricsServer<'_> {
    /// Returns the local address this server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts this server. Resolves once the server is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if starting the server operation fails.
    pub async fn start(self) -> io::Result<()> {
        self.server.await
    }
}
