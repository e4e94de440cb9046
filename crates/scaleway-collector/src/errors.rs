//! Process-wide error counters keyed by collector name.

use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Name of the exported counter family (`_total` is appended on encoding).
const ERRORS_METRIC: &str = "scaleway_errors";

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
struct CollectorLabels {
    collector: String,
}

/// Error counters for all collectors.
///
/// Counters are created when a collector is registered and are never reset. Incrementing
/// a counter is a single atomic operation, so it can be done from any number of concurrent tasks.
#[derive(Debug, Clone, Default)]
pub struct ErrorCounters {
    family: Family<CollectorLabels, Counter>,
}

impl ErrorCounters {
    /// Creates (or returns an existing) counter for the specified collector. The counter
    /// is exported with the zero value right away.
    pub fn register(&self, collector: &'static str) -> ErrorCounter {
        let labels = CollectorLabels {
            collector: collector.to_owned(),
        };
        let counter = Counter::clone(&self.family.get_or_create(&labels));
        ErrorCounter { collector, counter }
    }

    /// Returns the current value of the counter for `collector`, or `None` if it was never registered.
    pub fn get(&self, collector: &str) -> Option<u64> {
        let labels = CollectorLabels {
            collector: collector.to_owned(),
        };
        self.family.get(&labels).map(|counter| counter.get())
    }

    pub(crate) fn register_in(&self, registry: &mut Registry) {
        registry.register(
            ERRORS_METRIC,
            "The total number of errors per collector",
            self.family.clone(),
        );
    }
}

/// Handle to the error counter of a single collector.
#[derive(Debug, Clone)]
pub struct ErrorCounter {
    collector: &'static str,
    counter: Counter,
}

impl ErrorCounter {
    /// Returns the collector name this counter is labeled with.
    pub fn collector(&self) -> &'static str {
        self.collector
    }

    /// Records a recoverable failure.
    pub fn inc(&self) {
        self.counter.inc();
    }

    /// Returns the current counter value.
    pub fn get(&self) -> u64 {
        self.counter.get()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn registered_counters_start_at_zero() {
        let counters = ErrorCounters::default();
        assert_eq!(counters.get("database"), None);
        let counter = counters.register("database");
        assert_eq!(counter.collector(), "database");
        assert_eq!(counters.get("database"), Some(0));

        let mut registry = Registry::default();
        counters.register_in(&mut registry);
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &registry).unwrap();
        assert!(
            buffer.contains(r#"scaleway_errors_total{collector="database"} 0"#),
            "{buffer}"
        );
    }

    #[test]
    fn handles_share_state() {
        let counters = ErrorCounters::default();
        let first = counters.register("bucket");
        let second = counters.register("bucket");
        first.inc();
        second.inc();
        assert_eq!(counters.get("bucket"), Some(2));
        assert_eq!(counters.get("loadbalancer"), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        const TASKS: u64 = 32;
        const INCREMENTS: u64 = 1_000;

        let counters = Arc::new(ErrorCounters::default());
        let counter = counters.register("redis");
        let tasks: Vec<_> = (0..TASKS)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move {
                    for _ in 0..INCREMENTS {
                        counter.inc();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(counters.get("redis"), Some(TASKS * INCREMENTS));
    }
}
