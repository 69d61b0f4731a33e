//! Latency metrics for the translation pipeline.
//! Each named metric keeps its most recent samples in a bounded ring; the
//! operator `stats` command reports count, p50/p95/p99 and max per metric.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: usize = 1024;

/// Metric names recorded by the pipeline.
pub mod metric_names {
    /// Durable store read behind a cache lookup.
    pub const CACHE_LOOKUP: &str = "cache_lookup";
    /// Enqueue until the request's group is taken for dispatch.
    pub const QUEUE_WAIT: &str = "queue_wait";
    pub const PROVIDER_CALL: &str = "provider_call";
    /// One full dispatch cycle, all groups included.
    pub const BATCH_CYCLE: &str = "batch_cycle";
    pub const CACHE_SWEEP: &str = "cache_sweep";
}

/// Running timer; records into its registry on `finish`.
pub struct Timer {
    name: &'static str,
    started: Instant,
    registry: Arc<MetricsRegistry>,
}

impl Timer {
    pub fn finish(self) -> Duration {
        let elapsed = self.started.elapsed();
        self.registry.record(self.name, elapsed);
        elapsed
    }
}

/// Most recent samples of one metric, in microseconds.
struct LatencyWindow {
    samples: Vec<u64>,
    next: usize,
    capacity: usize,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            next: 0,
            capacity,
        }
    }

    fn push(&mut self, micros: u64) {
        if self.samples.len() < self.capacity {
            self.samples.push(micros);
        } else {
            self.samples[self.next] = micros;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    fn summarize(&self) -> LatencySummary {
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let at = |p: f64| -> u64 {
            if sorted.is_empty() {
                return 0;
            }
            let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
            sorted[idx.min(sorted.len() - 1)]
        };
        LatencySummary {
            count: sorted.len(),
            p50_us: at(50.0),
            p95_us: at(95.0),
            p99_us: at(99.0),
            max_us: sorted.last().copied().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LatencySummary {
    /// Samples currently in the window, not a lifetime total.
    pub count: usize,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

pub struct MetricsRegistry {
    windows: Mutex<HashMap<&'static str, LatencyWindow>>,
    window: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Registry keeping at most `window` samples per metric.
    pub fn with_window(window: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window: window.max(1),
        }
    }

    pub fn record(&self, name: &'static str, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.windows
            .lock()
            .entry(name)
            .or_insert_with(|| LatencyWindow::new(self.window))
            .push(micros);
        tracing::trace!(metric = name, micros, "latency recorded");
    }

    pub fn timer(self: &Arc<Self>, name: &'static str) -> Timer {
        Timer {
            name,
            started: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Summary for every metric that has samples, sorted by name.
    pub fn summary(&self) -> BTreeMap<&'static str, LatencySummary> {
        self.windows
            .lock()
            .iter()
            .map(|(&name, window)| (name, window.summarize()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn micros(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    #[test]
    fn summary_reports_percentiles_and_max() {
        let registry = MetricsRegistry::new();
        for v in 1..=100 {
            registry.record(metric_names::PROVIDER_CALL, micros(v));
        }
        let summary = registry.summary();
        let call = &summary[metric_names::PROVIDER_CALL];
        assert_eq!(call.count, 100);
        assert!((50..=51).contains(&call.p50_us));
        assert_eq!(call.p99_us, 99);
        assert_eq!(call.max_us, 100);
        assert!(!summary.contains_key("unknown"));
    }

    #[test]
    fn window_keeps_only_latest_samples() {
        let registry = MetricsRegistry::with_window(4);
        for v in [900, 900, 1, 2, 3, 4] {
            registry.record(metric_names::QUEUE_WAIT, micros(v));
        }
        let summary = registry.summary();
        let wait = &summary[metric_names::QUEUE_WAIT];
        assert_eq!(wait.count, 4);
        assert_eq!(wait.max_us, 4);
    }

    #[test]
    fn timer_records_on_finish() {
        let registry = Arc::new(MetricsRegistry::new());
        registry.timer(metric_names::CACHE_LOOKUP).finish();
        assert_eq!(registry.summary()[metric_names::CACHE_LOOKUP].count, 1);
    }
}
