//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics, shared by every ingestion thread
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Inertial samples accepted into the buffer
    pub samples_received: AtomicU64,

    /// Frames accepted by the frame queue
    pub frames_received: AtomicU64,

    /// Reference poses accepted into the pose buffer
    pub poses_received: AtomicU64,

    /// Readings rejected for non-increasing timestamps
    pub rejected: AtomicU64,

    /// Frames discarded because the frame queue was closed
    pub frames_discarded: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pose(&self) {
        self.poses_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_discarded(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            poses_received: self.poses_received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub samples_received: u64,
    pub frames_received: u64,
    pub poses_received: u64,
    pub rejected: u64,
    pub frames_discarded: u64,
}
