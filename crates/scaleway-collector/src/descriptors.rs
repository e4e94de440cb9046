//! Gauge descriptors, observations and the per-collector registry of upstream series.

use std::{collections::HashMap, fmt, marker::PhantomData};

use crate::{
    labels::LabelSet,
    model::TimeSeries,
    validation::{assert_label_names, assert_metric_name},
};

/// Static exposition metadata for one gauge.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Descriptor {
    /// Full metric name, e.g. `scaleway_database_up`.
    pub name: &'static str,
    /// Help text.
    pub help: &'static str,
    /// Label names in exposition order.
    pub labels: &'static [&'static str],
}

/// Gauge descriptor with a typed label schema.
///
/// Declared as `static`s; names are validated at compile time.
pub struct GaugeDescriptor<L> {
    descriptor: Descriptor,
    _labels: PhantomData<fn(L)>,
}

impl<L: LabelSet> fmt::Debug for GaugeDescriptor<L> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.descriptor, formatter)
    }
}

impl<L: LabelSet> GaugeDescriptor<L> {
    /// Creates a descriptor.
    ///
    /// # Panics
    ///
    /// Panics if the metric name or one of the label names is invalid, or if label names repeat.
    #[track_caller]
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        assert_metric_name(name);
        assert_label_names(L::NAMES);
        Self {
            descriptor: Descriptor {
                name,
                help,
                labels: L::NAMES,
            },
            _labels: PhantomData,
        }
    }

    /// Returns the untyped descriptor.
    pub fn descriptor(&'static self) -> &'static Descriptor {
        &self.descriptor
    }

    /// Builds an observation of this gauge.
    pub fn observe(&'static self, labels: L, value: f64) -> Observation {
        Observation {
            descriptor: &self.descriptor,
            labels: labels.into_values(),
            value,
        }
    }
}

/// Single reported gauge value with its labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    descriptor: &'static Descriptor,
    labels: Vec<String>,
    value: f64,
}

impl Observation {
    /// Returns the descriptor of the observed gauge.
    pub fn descriptor(&self) -> &'static Descriptor {
        self.descriptor
    }

    /// Returns the observed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns label values in schema order.
    pub fn label_values(&self) -> &[String] {
        &self.labels
    }

    /// Iterates over `(name, value)` label pairs.
    pub fn labels(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.descriptor
            .labels
            .iter()
            .copied()
            .zip(self.labels.iter().map(String::as_str))
    }

    /// Returns the value of the label with the specified name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels()
            .find_map(|(label, value)| (label == name).then_some(value))
    }
}

type EmitFn<R> = Box<dyn Fn(&R, &TimeSeries, f64) -> Observation + Send + Sync>;

/// Mapping of an upstream series to a gauge.
pub struct SeriesMapping<R> {
    descriptor: &'static Descriptor,
    emit: EmitFn<R>,
}

impl<R> fmt::Debug for SeriesMapping<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SeriesMapping")
            .field("descriptor", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

impl<R> SeriesMapping<R> {
    /// Returns the gauge descriptor the series is reported as.
    pub fn descriptor(&self) -> &'static Descriptor {
        self.descriptor
    }

    /// Builds an observation for a `resource` series with the reduced `value`.
    pub fn observe(&self, resource: &R, series: &TimeSeries, value: f64) -> Observation {
        (self.emit)(resource, series, value)
    }
}

/// Outcome of resolving an upstream series name.
#[derive(Debug)]
pub enum Resolution<'a, R> {
    /// Series is reported as a gauge.
    Mapped(&'a SeriesMapping<R>),
    /// Series is known upstream, but deliberately not exported.
    Ignored,
    /// Series is not known to the collector.
    Unknown,
}

/// Registry mapping upstream series names to gauges for resources of type `R`.
///
/// Built once per collector. Lookups of names that were not registered are not errors.
pub struct SeriesRegistry<R> {
    mappings: HashMap<&'static str, SeriesMapping<R>>,
    ignored: Vec<&'static str>,
    descriptors: Vec<&'static Descriptor>,
}

impl<R> fmt::Debug for SeriesRegistry<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SeriesRegistry")
            .field("mappings", &self.mappings)
            .field("ignored", &self.ignored)
            .finish()
    }
}

impl<R> Default for SeriesRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> SeriesRegistry<R> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            mappings: HashMap::new(),
            ignored: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    /// Maps the upstream `series` to `gauge`. `labels` builds gauge labels from the resource
    /// and the series (e.g., to read the node from series metadata).
    ///
    /// # Panics
    ///
    /// Panics if `series` is already registered.
    #[must_use]
    pub fn map<L: LabelSet>(
        mut self,
        series: &'static str,
        gauge: &'static GaugeDescriptor<L>,
        labels: fn(&R, &TimeSeries) -> L,
    ) -> Self
    where
        R: 'static,
    {
        let descriptor = gauge.descriptor();
        let mapping = SeriesMapping {
            descriptor,
            emit: Box::new(move |resource, series, value| {
                gauge.observe(labels(resource, series), value)
            }),
        };
        let prev = self.mappings.insert(series, mapping);
        assert!(prev.is_none(), "series `{series}` is mapped twice");
        if !self.descriptors.contains(&descriptor) {
            self.descriptors.push(descriptor);
        }
        self
    }

    /// Marks the upstream `series` as known but not exported.
    #[must_use]
    pub fn ignore(mut self, series: &'static str) -> Self {
        self.ignored.push(series);
        self
    }

    /// Resolves an upstream series name.
    pub fn resolve(&self, series: &str) -> Resolution<'_, R> {
        if let Some(mapping) = self.mappings.get(series) {
            Resolution::Mapped(mapping)
        } else if self.ignored.iter().any(|&ignored| ignored == series) {
            Resolution::Ignored
        } else {
            Resolution::Unknown
        }
    }

    /// Returns descriptors of all mapped gauges in registration order.
    pub fn descriptors(&self) -> &[&'static Descriptor] {
        &self.descriptors
    }
}
