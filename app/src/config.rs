//! Command-line and environment configuration.

use std::{
    fmt,
    net::{AddrParseError, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use scaleway_collector::{Format, Region, ScalewayClient};

/// Text format metrics are exported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ExportFormat {
    /// Prometheus text format, version 0.0.4.
    Prometheus,
    /// OpenMetrics text format, version 1.0.0.
    OpenMetrics,
}

impl From<ExportFormat> for Format {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Prometheus => Self::Prometheus,
            ExportFormat::OpenMetrics => Self::OpenMetrics,
        }
    }
}

/// Parses a listen address; a missing host (e.g., `:9503`) means all interfaces.
fn parse_web_addr(raw: &str) -> Result<SocketAddr, AddrParseError> {
    match raw.strip_prefix(':') {
        Some(port) => format!("{}:{port}", Ipv4Addr::UNSPECIFIED).parse(),
        None => raw.parse(),
    }
}

/// Prometheus exporter for Scaleway managed resources.
///
/// All options can also be set via environment variables; command-line arguments take precedence.
#[derive(Debug, Parser)]
#[command(name = "scaleway_exporter", version)]
pub(crate) struct Config {
    /// Enables debug logging. `RUST_LOG` overrides the log filter entirely.
    #[arg(long, env = "DEBUG")]
    pub debug: bool,
    /// Scaleway access key, used to list object storage buckets.
    #[arg(long, env = "SCALEWAY_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,
    /// Scaleway secret key.
    #[arg(long, env = "SCALEWAY_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
    /// Region to scan; all known regions are scanned if not set.
    #[arg(long, env = "SCALEWAY_REGION")]
    pub region: Option<String>,
    /// Organization to report billing consumptions for. Billing is disabled if not set.
    #[arg(long, env = "SCALEWAY_ORGANIZATION_ID")]
    pub organization_id: Option<String>,
    /// Scrape timeout in milliseconds.
    #[arg(long, env = "HTTP_TIMEOUT", default_value_t = 5_000)]
    pub http_timeout: u64,
    /// Address the metrics server listens on.
    #[arg(long, env = "WEB_ADDR", default_value = "0.0.0.0:9503", value_parser = parse_web_addr)]
    pub web_addr: SocketAddr,
    /// Path metrics are served on.
    #[arg(long, env = "WEB_PATH", default_value = "/metrics")]
    pub web_path: String,
    /// Scaleway API endpoint.
    #[arg(long, env = "SCALEWAY_API_URL", default_value = ScalewayClient::DEFAULT_API_URL)]
    pub api_url: String,
    /// Exported text format.
    #[arg(long, env = "EXPORT_FORMAT", value_enum, default_value_t = ExportFormat::Prometheus)]
    pub format: ExportFormat,
    /// Disables the managed database collector.
    #[arg(long)]
    pub disable_database_collector: bool,
    /// Disables the object storage collector.
    #[arg(long)]
    pub disable_bucket_collector: bool,
    /// Disables the load balancer collector.
    #[arg(long)]
    pub disable_loadbalancer_collector: bool,
    /// Disables the managed Redis collector.
    #[arg(long)]
    pub disable_redis_collector: bool,
    /// Disables the billing collector.
    #[arg(long)]
    pub disable_billing_collector: bool,
}

/// API credentials.
pub(crate) struct Credentials<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Returns API credentials, checking that they are provided.
    pub fn credentials(&self) -> anyhow::Result<Credentials<'_>> {
        let access_key = self
            .access_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context("Scaleway access key is required; set it via --access-key or SCALEWAY_ACCESS_KEY")?;
        let secret_key = self
            .secret_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context("Scaleway secret key is required; set it via --secret-key or SCALEWAY_SECRET_KEY")?;
        Ok(Credentials {
            access_key,
            secret_key,
        })
    }

    /// Returns regions to scan.
    pub fn regions(&self) -> Vec<Region> {
        match self.region.as_deref() {
            Some(region) if !region.is_empty() => vec![Region::new(region)],
            _ => Region::all(),
        }
    }

    /// Returns the scrape timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parsing_web_addr() {
        let addr = parse_web_addr(":9503").unwrap();
        assert_eq!(addr, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9503)));
        let addr = parse_web_addr("127.0.0.1:8080").unwrap();
        assert_eq!(addr, SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)));
        parse_web_addr("localhost").unwrap_err();
    }

    #[test]
    fn parsing_args() {
        let config = Config::try_parse_from([
            "scaleway_exporter",
            "--access-key",
            "SCWXXXXXXXXXXXXXXXXX",
            "--secret-key",
            "secret",
            "--region",
            "nl-ams",
            "--web-addr",
            ":9000",
            "--format",
            "open-metrics",
            "--http-timeout",
            "2500",
            "--disable-loadbalancer-collector",
        ])
        .unwrap();

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.access_key, "SCWXXXXXXXXXXXXXXXXX");
        assert_eq!(credentials.secret_key, "secret");
        assert_eq!(config.regions(), [Region::NL_AMS]);
        assert_eq!(config.web_addr.port(), 9000);
        assert_eq!(config.format, ExportFormat::OpenMetrics);
        assert_eq!(config.timeout(), Duration::from_millis(2_500));
        assert!(config.disable_loadbalancer_collector);
        assert!(!config.disable_database_collector);
    }

    #[test]
    fn missing_credentials() {
        let config = Config::try_parse_from(["scaleway_exporter", "--access-key", "key"]).unwrap();
        let err = config.credentials().unwrap_err();
        assert!(err.to_string().contains("secret key is required"), "{err}");
    }

    #[test]
    fn invalid_format() {
        let err = Config::try_parse_from(["scaleway_exporter", "--format", "json"]).unwrap_err();
        assert_matches!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
