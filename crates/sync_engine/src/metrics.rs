//! Assembler metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::DropReason;

/// Assembler counters, shared with whoever reports on the pipeline
#[derive(Debug, Default)]
pub struct AssemblerMetrics {
    /// Frames taken from the frame queue
    pub frames_received: AtomicU64,

    /// Packets handed to the frontend queue
    pub packets_dispatched: AtomicU64,

    /// Inertial samples across all dispatched packets
    pub samples_dispatched: AtomicU64,

    /// Extraction attempts that had to wait for coverage
    pub coverage_retries: AtomicU64,

    pub dropped_data_gap: AtomicU64,
    pub dropped_coverage_timeout: AtomicU64,
    pub dropped_stream_ended: AtomicU64,
    pub dropped_non_increasing: AtomicU64,
}

impl AssemblerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_frames_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, samples: usize) {
        self.packets_dispatched.fetch_add(1, Ordering::Relaxed);
        self.samples_dispatched
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn inc_coverage_retries(&self) {
        self.coverage_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::DataGap => &self.dropped_data_gap,
            DropReason::CoverageTimeout => &self.dropped_coverage_timeout,
            DropReason::StreamEnded => &self.dropped_stream_ended,
            DropReason::NonIncreasingFrame => &self.dropped_non_increasing,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> AssemblerStats {
        AssemblerStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            packets_dispatched: self.packets_dispatched.load(Ordering::Relaxed),
            samples_dispatched: self.samples_dispatched.load(Ordering::Relaxed),
            coverage_retries: self.coverage_retries.load(Ordering::Relaxed),
            dropped_data_gap: self.dropped_data_gap.load(Ordering::Relaxed),
            dropped_coverage_timeout: self.dropped_coverage_timeout.load(Ordering::Relaxed),
            dropped_stream_ended: self.dropped_stream_ended.load(Ordering::Relaxed),
            dropped_non_increasing: self.dropped_non_increasing.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of assembler metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames_received: u64,
    pub packets_dispatched: u64,
    pub samples_dispatched: u64,
    pub coverage_retries: u64,
    pub dropped_data_gap: u64,
    pub dropped_coverage_timeout: u64,
    pub dropped_stream_ended: u64,
    pub dropped_non_increasing: u64,
}

impl AssemblerStats {
    pub fn frames_dropped(&self) -> u64 {
        self.dropped_data_gap
            + self.dropped_coverage_timeout
            + self.dropped_stream_ended
            + self.dropped_non_increasing
    }
}
