//! Process-local counters and last-duration gauges.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Duration of the most recent timed operation, in microseconds.
#[derive(Debug, Default)]
pub struct Timing(AtomicU64);

impl Timing {
    pub fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.0.store(micros, Ordering::Relaxed);
    }

    pub fn last(&self) -> Duration {
        Duration::from_micros(self.0.load(Ordering::Relaxed))
    }
}

/// Value of one exported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricValue {
    Counter { value: u64 },
    Timing { micros: u64 },
}

#[derive(Debug, Clone)]
enum Metric {
    Counter(Arc<Counter>),
    Timing(Arc<Timing>),
}

/// Named metrics shared by the caches and the planner.
///
/// Registering an existing name returns the handle already registered, so
/// two caches with the same prefix report into the same counters.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    metrics: Arc<Mutex<BTreeMap<String, Metric>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> Arc<Counter> {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        match metrics.get(name) {
            Some(Metric::Counter(counter)) => Arc::clone(counter),
            _ => {
                let counter = Arc::new(Counter::default());
                metrics.insert(name.to_owned(), Metric::Counter(Arc::clone(&counter)));
                counter
            }
        }
    }

    pub fn timing(&self, name: &str) -> Arc<Timing> {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        match metrics.get(name) {
            Some(Metric::Timing(timing)) => Arc::clone(timing),
            _ => {
                let timing = Arc::new(Timing::default());
                metrics.insert(name.to_owned(), Metric::Timing(Arc::clone(&timing)));
                timing
            }
        }
    }

    /// Current value of every registered metric, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, MetricValue> {
        let metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        metrics
            .iter()
            .map(|(name, metric)| {
                let value = match metric {
                    Metric::Counter(counter) => MetricValue::Counter {
                        value: counter.get(),
                    },
                    Metric::Timing(timing) => MetricValue::Timing {
                        micros: u64::try_from(timing.last().as_micros()).unwrap_or(u64::MAX),
                    },
                };
                (name.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_shared_by_name() {
        let registry = MetricsRegistry::new();
        registry.counter("chart-cache-gets").incr();
        registry.counter("chart-cache-gets").incr();

        assert_eq!(registry.counter("chart-cache-gets").get(), 2);
        assert_eq!(
            registry.snapshot().get("chart-cache-gets"),
            Some(&MetricValue::Counter { value: 2 })
        );
    }

    #[test]
    fn timing_keeps_most_recent_duration() {
        let registry = MetricsRegistry::new();
        let timing = registry.timing("chart-cache-save-time");
        timing.record(Duration::from_millis(5));
        timing.record(Duration::from_micros(250));

        assert_eq!(
            registry.snapshot().get("chart-cache-save-time"),
            Some(&MetricValue::Timing { micros: 250 })
        );
    }

    #[test]
    fn snapshot_is_sorted_by_name() {
        let registry = MetricsRegistry::new();
        registry.counter("quote-cache-puts");
        registry.counter("get-charts-requests");
        registry.timing("chart-cache-load-time");

        let names: Vec<_> = registry.snapshot().into_keys().collect();
        assert_eq!(
            names,
            vec![
                "chart-cache-load-time",
                "get-charts-requests",
                "quote-cache-puts"
            ]
        );
    }
}
