//! Support for exposition text formats.

use std::{fmt, mem};

use prometheus_client::{encoding::text, registry::Registry};

/// Metrics export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// [OpenMetrics text format][om] produced by [`prometheus-client`].
    ///
    /// [om]: https://github.com/OpenObservability/OpenMetrics/blob/main/specification/OpenMetrics.md
    /// [`prometheus-client`]: https://docs.rs/prometheus-client/
    OpenMetrics,
    /// [Prometheus text format][prom], version 0.0.4. It's obtained by a streaming transform
    /// of OpenMetrics-encoded metrics that names counter families after their `_total` samples,
    /// drops `# UNIT` metadata and removes the `# EOF` terminator.
    ///
    /// [prom]: https://prometheus.io/docs/instrumenting/exposition_formats/
    #[default]
    Prometheus,
}

impl Format {
    /// Content type for the OpenMetrics text format.
    pub const OPEN_METRICS_CONTENT_TYPE: &'static str =
        "application/openmetrics-text; version=1.0.0; charset=utf-8";
    /// Content type for the Prometheus text format.
    pub const PROMETHEUS_CONTENT_TYPE: &'static str = "text/plain; version=0.0.4; charset=utf-8";

    /// Returns the HTTP content type for this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::OpenMetrics => Self::OPEN_METRICS_CONTENT_TYPE,
            Self::Prometheus => Self::PROMETHEUS_CONTENT_TYPE,
        }
    }

    /// Encodes `registry` in this format.
    ///
    /// # Errors
    ///
    /// Proxies formatting errors of the provided `writer`.
    pub fn encode<W: fmt::Write>(self, writer: &mut W, registry: &Registry) -> fmt::Result {
        match self {
            Self::OpenMetrics => text::encode(writer, registry),
            Self::Prometheus => {
                let mut wrapper = PrometheusWrapper::new(writer);
                text::encode(&mut wrapper, registry)?;
                wrapper.flush()
            }
        }
    }
}

#[derive(Debug)]
struct MetricTypeDefinition {
    name: String,
    is_counter: bool,
}

impl MetricTypeDefinition {
    fn parse(line: &str) -> Result<Self, fmt::Error> {
        let (name, ty) = line
            .trim()
            .split_once(|ch: char| ch.is_ascii_whitespace())
            .ok_or(fmt::Error)?;
        Ok(Self {
            name: name.to_owned(),
            is_counter: ty == "counter",
        })
    }
}

#[must_use = "Must be `flush()`ed to not lose the last line"]
#[derive(Debug)]
struct PrometheusWrapper<'a, W> {
    writer: &'a mut W,
    pending_help: Option<String>,
    last_line: String,
}

impl<'a, W: fmt::Write> PrometheusWrapper<'a, W> {
    fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            pending_help: None,
            last_line: String::new(),
        }
    }

    fn write_pending_help(&mut self) -> fmt::Result {
        if let Some(help) = self.pending_help.take() {
            writeln!(self.writer, "{help}")?;
        }
        Ok(())
    }

    fn handle_line(&mut self) -> fmt::Result {
        let line = mem::take(&mut self.last_line);
        if line == "# EOF" || line.starts_with("# UNIT ") {
            return Ok(());
        }
        if line.starts_with("# HELP ") {
            // Help precedes the type definition, so it can only be output once the type is known.
            self.write_pending_help()?;
            self.pending_help = Some(line);
            return Ok(());
        }

        let Some(type_def) = line.strip_prefix("# TYPE ") else {
            self.write_pending_help()?;
            return writeln!(self.writer, "{line}");
        };
        let type_def = MetricTypeDefinition::parse(type_def)?;
        if !type_def.is_counter {
            self.write_pending_help()?;
            return writeln!(self.writer, "{line}");
        }

        // Counter samples are reported as `<name>_total`; the family must have the same name.
        let name = &type_def.name;
        if let Some(help) = self.pending_help.take() {
            let help_text = help
                .strip_prefix("# HELP ")
                .and_then(|rest| rest.strip_prefix(name.as_str()));
            match help_text {
                Some(help_text) => writeln!(self.writer, "# HELP {name}_total{help_text}")?,
                None => writeln!(self.writer, "{help}")?,
            }
        }
        writeln!(self.writer, "# TYPE {name}_total counter")
    }

    fn flush(mut self) -> fmt::Result {
        if !self.last_line.is_empty() {
            self.handle_line()?;
        }
        self.write_pending_help()
    }
}

impl<W: fmt::Write> fmt::Write for PrometheusWrapper<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let lines: Vec<_> = s.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            self.last_line.push_str(line);
            if i + 1 < lines.len() || s.ends_with('\n') {
                self.handle_line()?;
            }
        }
        Ok(())
    }
}
