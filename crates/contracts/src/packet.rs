//! SynchronizedPacket - Synchronization Assembler output
//!
//! A camera frame paired with the exact inertial interval preceding it.

use serde::{Deserialize, Serialize};

use crate::{InertialSample, StereoFrame, Timestamp};

/// Synchronized packet
///
/// Invariants:
/// - `interval_end_ts == frame.timestamp`
/// - every sample satisfies `interval_start_ts <= t <= interval_end_ts`
/// - the first sample sits on `interval_start_ts`, the last on `interval_end_ts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizedPacket {
    /// Dispatch sequence number (monotonically increasing)
    pub sequence: u64,

    /// Camera frame
    pub frame: StereoFrame,

    /// Inertial samples covering `[interval_start_ts, interval_end_ts]`
    pub inertial_interval: Vec<InertialSample>,

    /// Previous frame timestamp (or pipeline start)
    pub interval_start_ts: Timestamp,

    /// Equals `frame.timestamp`
    pub interval_end_ts: Timestamp,
}

impl SynchronizedPacket {
    /// Interval duration (ns)
    pub fn interval_duration(&self) -> Timestamp {
        self.interval_end_ts - self.interval_start_ts
    }

    /// Number of inertial samples in the interval
    pub fn sample_count(&self) -> usize {
        self.inertial_interval.len()
    }
}

/// Why a frame was dropped instead of dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Inertial data for the interval was purged or never arrived
    DataGap,
    /// Inertial coverage did not arrive within the configured maximum wait
    CoverageTimeout,
    /// The inertial stream ended before covering the frame
    StreamEnded,
    /// Frame timestamp does not advance past the previous frame
    NonIncreasingFrame,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::DataGap => "data_gap",
            DropReason::CoverageTimeout => "coverage_timeout",
            DropReason::StreamEnded => "stream_ended",
            DropReason::NonIncreasingFrame => "non_increasing_frame",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report of a dropped camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDrop {
    pub frame_id: u64,
    pub frame_ts: Timestamp,
    pub interval_start: Timestamp,
    pub reason: DropReason,
}
