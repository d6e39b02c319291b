//! In-process pipeline metrics.
//!
//! Counters are lock-free atomics; `snapshot()` is what the HTTP surface
//! serves and what the worker scheduler logs on its metrics interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the tick pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Producer metrics
    pub ticks_produced: Counter,
    pub queue_send_errors: Counter,

    // Ingestor metrics
    pub batches_received: Counter,
    pub messages_received: Counter,
    pub messages_acked: Counter,
    pub malformed_payloads: Counter,
    pub ticks_stored: Counter,
    pub store_write_errors: Counter,
    pub alerts_published: Counter,
    pub alert_publish_errors: Counter,
    pub messages_dead_lettered: Counter,
    pub queue_receive_errors: Counter,

    // Latency histograms
    pub store_latency_ms: Histogram,
    pub batch_latency_ms: Histogram,

    // Gauges
    pub queue_depth: Gauge,
    pub in_flight: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub ticks_produced: u64,
    pub queue_send_errors: u64,
    pub batches_received: u64,
    pub messages_received: u64,
    pub messages_acked: u64,
    pub malformed_payloads: u64,
    pub ticks_stored: u64,
    pub store_write_errors: u64,
    pub alerts_published: u64,
    pub alert_publish_errors: u64,
    pub messages_dead_lettered: u64,
    pub queue_receive_errors: u64,
    pub store_latency_mean_ms: f64,
    pub batch_latency_mean_ms: f64,
    pub queue_depth: u64,
    pub in_flight: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            ticks_produced: self.ticks_produced.get(),
            queue_send_errors: self.queue_send_errors.get(),
            batches_received: self.batches_received.get(),
            messages_received: self.messages_received.get(),
            messages_acked: self.messages_acked.get(),
            malformed_payloads: self.malformed_payloads.get(),
            ticks_stored: self.ticks_stored.get(),
            store_write_errors: self.store_write_errors.get(),
            alerts_published: self.alerts_published.get(),
            alert_publish_errors: self.alert_publish_errors.get(),
            messages_dead_lettered: self.messages_dead_lettered.get(),
            queue_receive_errors: self.queue_receive_errors.get(),
            store_latency_mean_ms: self.store_latency_ms.mean(),
            batch_latency_mean_ms: self.batch_latency_ms.mean(),
            queue_depth: self.queue_depth.get(),
            in_flight: self.in_flight.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
