//! Stage metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single stage worker
#[derive(Debug, Default)]
pub struct StageMetrics {
    /// Input queue length seen at the last pop
    queue_len: AtomicUsize,
    /// Items processed successfully
    processed_count: AtomicU64,
    /// Items whose processing failed
    failure_count: AtomicU64,
    /// Sum of processing latencies (µs)
    latency_total_us: AtomicU64,
}

impl StageMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Record one processed item
    pub fn record(&self, success: bool, latency_us: u64) {
        if success {
            self.processed_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_total_us
            .fetch_add(latency_us, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> StageStats {
        let processed = self.processed_count();
        let failures = self.failure_count();
        let total = processed + failures;
        let latency_total_us = self.latency_total_us.load(Ordering::Relaxed);
        StageStats {
            queue_len: self.queue_len(),
            processed,
            failures,
            mean_latency_ms: if total > 0 {
                latency_total_us as f64 / total as f64 / 1000.0
            } else {
                0.0
            },
        }
    }
}

/// Snapshot of stage metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageStats {
    pub queue_len: usize,
    pub processed: u64,
    pub failures: u64,
    pub mean_latency_ms: f64,
}
