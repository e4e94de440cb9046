//! Tests for metrics exporter.

use std::{net::Ipv4Addr, str, time::Duration};

use async_trait::async_trait;
use http_body_util::BodyExt as _;
use hyper::Uri;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use tokio::sync::oneshot;
use tracing::subscriber::Subscriber;
use tracing_capture::{CaptureLayer, SharedStorage};
use tracing_subscriber::layer::SubscriberExt;

use super::*;
use scaleway_collector::{
    label_set, Collect, Descriptor, ErrorCounters, ExporterInfo, GaugeDescriptor,
    ObservationSink, ScrapeContext,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(3);

label_set! {
    struct StubLabels {
        id => "id",
    }
}

static STUB_UP: GaugeDescriptor<StubLabels> = GaugeDescriptor::new("stub_up", "Stub liveness");

#[derive(Debug)]
struct StubCollector;

#[async_trait]
impl Collect for StubCollector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn describe(&self) -> Vec<&'static Descriptor> {
        vec![STUB_UP.descriptor()]
    }

    async fn collect(&self, sink: &ObservationSink, _cx: &ScrapeContext) {
        let labels = StubLabels {
            id: "1".to_owned(),
        };
        sink.emit(STUB_UP.observe(labels, 0.5));
    }
}

fn test_orchestrator() -> Arc<Orchestrator> {
    let errors = ErrorCounters::default();
    errors.register("stub");
    let orchestrator = Orchestrator::new(errors, Duration::from_secs(1))
        .with_collector(StubCollector)
        .with_info(ExporterInfo::new("0.1.0", "test"));
    Arc::new(orchestrator)
}

fn tracing_subscriber(storage: &SharedStorage) -> impl Subscriber {
    tracing_subscriber::fmt()
        .pretty()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .finish()
        .with(CaptureLayer::new(storage))
}

async fn get(uri: Uri) -> (Option<String>, String) {
    let client = Client::builder(TokioExecutor::new()).build_http::<String>();
    let response = tokio::time::timeout(TEST_TIMEOUT, client.get(uri))
        .await
        .expect("timed out waiting for response")
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| value.to_str().unwrap().to_owned());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (content_type, str::from_utf8(&body).unwrap().to_owned())
}

#[tokio::test]
async fn rendering_metrics() {
    let exporter = MetricsExporter::new(test_orchestrator());
    let body = exporter.inner.render_body().await;
    let lines: Vec<_> = body.lines().collect();

    assert!(lines.iter().all(|line| !line.is_empty()));
    let expected_lines = [
        "# HELP stub_up Stub liveness.",
        "# TYPE stub_up gauge",
        r#"stub_up{id="1"} 0.5"#,
        "# TYPE scaleway_errors_total counter",
        r#"scaleway_errors_total{collector="stub"} 0"#,
        r#"scaleway_exporter_build_info{version="0.1.0",revision="test"} 1"#,
        "# TYPE scaleway_exporter_scrape_duration_seconds histogram",
        r#"scaleway_exporter_scrape_duration_seconds_count{collector="stub"} 1"#,
    ];
    for line in expected_lines {
        assert!(lines.contains(&line), "{lines:#?}");
    }
    assert!(!lines.contains(&"# EOF"), "{lines:#?}");

    // Exporter metrics accumulate across scrapes.
    let body = exporter.inner.render_body().await;
    assert!(
        body.contains(r#"scaleway_exporter_scrape_duration_seconds_count{collector="stub"} 2"#),
        "{body}"
    );
    assert!(body.contains("scaleway_exporter_scraped_size_bytes_count 1"), "{body}");
}

#[tokio::test]
async fn serving_metrics_and_landing_page() {
    let tracing_storage = SharedStorage::default();
    let _subscriber_guard = tracing::subscriber::set_default(tracing_subscriber(&tracing_storage));
    // ^ **NB.** `set_default()` only works because tests use a single-threaded Tokio runtime

    let (shutdown_sender, shutdown) = oneshot::channel::<()>();
    let exporter = MetricsExporter::new(test_orchestrator())
        .with_format(Format::OpenMetrics)
        .with_metrics_path("/custom-metrics")
        .with_graceful_shutdown(async move {
            shutdown.await.ok();
        });
    let bind_address: SocketAddr = (Ipv4Addr::LOCALHOST, 0).into();
    let server = exporter.bind(bind_address).await.unwrap();
    let local_addr = server.local_addr();
    let server_task = tokio::spawn(server.start());

    let uri = format!("http://{local_addr}/custom-metrics").parse().unwrap();
    let (content_type, body) = get(uri).await;
    assert_eq!(content_type.as_deref(), Some(Format::OPEN_METRICS_CONTENT_TYPE));
    let lines: Vec<_> = body.lines().collect();
    assert!(lines.contains(&r#"stub_up{id="1"} 0.5"#), "{lines:#?}");
    assert_eq!(lines.last(), Some(&"# EOF"));

    let uri = format!("http://{local_addr}/").parse().unwrap();
    let (content_type, body) = get(uri).await;
    assert_eq!(content_type.as_deref(), Some(HTML_CONTENT_TYPE));
    assert!(body.contains(r#"<a href="/custom-metrics">Metrics</a>"#), "{body}");

    shutdown_sender.send(()).unwrap();
    tokio::time::timeout(TEST_TIMEOUT, server_task)
        .await
        .expect("server didn't shut down")
        .unwrap()
        .unwrap();

    let storage = tracing_storage.lock();
    let shutdown_logs = storage.all_events().filter(|event| {
        event
            .message()
            .is_some_and(|message| message.contains("Stop signal received"))
    });
    assert_eq!(shutdown_logs.count(), 1);
}
