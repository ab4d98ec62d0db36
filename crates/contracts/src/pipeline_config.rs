//! PipelineConfig - Config Loader output
//!
//! Everything the Pipeline Coordinator consumes at construction time:
//! inertial wait policy, queue capacities, reference buffer bounds, sources.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Timestamp;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Synchronization policy
    #[serde(default)]
    pub sync: SyncConfig,

    /// Inter-stage queue capacities
    #[serde(default)]
    pub queues: QueuesConfig,

    /// Reference pose buffer bounds
    #[serde(default)]
    pub reference_buffer: TemporalBufferConfig,

    /// Sensor sources (mock/replay)
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Shutdown policy
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Synchronization Assembler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum time a frame may wait for inertial coverage before it is
    /// reclassified as a data gap (milliseconds)
    pub max_inertial_wait_ms: u64,

    /// First retry backoff (milliseconds)
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds)
    pub max_backoff_ms: u64,

    /// Designated interval start for the first frame (ns).
    /// When absent the first frame opens a zero-length interval at its own timestamp.
    pub pipeline_start_ns: Option<Timestamp>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_inertial_wait_ms: 200,
            initial_backoff_ms: 1,
            max_backoff_ms: 20,
            pipeline_start_ns: None,
        }
    }
}

impl SyncConfig {
    pub fn max_inertial_wait(&self) -> Duration {
        Duration::from_millis(self.max_inertial_wait_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Queue capacity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueueCapacity {
    /// `push` blocks when `capacity` items are queued (backpressure)
    Bounded { capacity: usize },
    /// Memory-bounded only by producer/consumer speed mismatch
    Unbounded,
}

impl QueueCapacity {
    pub fn bounded(capacity: usize) -> Self {
        Self::Bounded { capacity }
    }

    /// `Some(capacity)` in bounded mode
    pub fn limit(self) -> Option<usize> {
        match self {
            QueueCapacity::Bounded { capacity } => Some(capacity),
            QueueCapacity::Unbounded => None,
        }
    }
}

/// Capacities of the three pipeline queues
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuesConfig {
    /// Camera ingestion -> Assembler
    pub frames: QueueCapacity,
    /// Assembler -> Frontend
    pub frontend: QueueCapacity,
    /// Frontend -> Backend
    pub backend: QueueCapacity,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            frames: QueueCapacity::bounded(4),
            frontend: QueueCapacity::bounded(8),
            backend: QueueCapacity::bounded(16),
        }
    }
}

/// Generic temporal buffer bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalBufferConfig {
    /// Maximum retained entries
    pub max_entries: usize,
    /// Maximum retained time span (milliseconds)
    pub max_span_ms: Option<u64>,
}

impl Default for TemporalBufferConfig {
    fn default() -> Self {
        Self {
            max_entries: 512,
            max_span_ms: None,
        }
    }
}

impl TemporalBufferConfig {
    /// Time-span bound in nanoseconds
    pub fn max_span_ns(&self) -> Option<Timestamp> {
        self.max_span_ms.map(|ms| crate::time::millis(ms as i64))
    }
}

/// Mock sensor sources used by the CLI and demos
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Inertial sensor ID
    pub imu_sensor_id: String,
    /// Stereo camera ID
    pub camera_sensor_id: String,
    /// Inertial rate (Hz)
    pub imu_rate_hz: f64,
    /// Camera rate (Hz)
    pub camera_rate_hz: f64,
    /// Reference pose rate (Hz), `None` disables the pose stream
    pub pose_rate_hz: Option<f64>,
    /// Image width
    pub image_width: u32,
    /// Image height
    pub image_height: u32,
    /// Pace sources at their nominal rate
    pub realtime: bool,
    /// Stream length in seconds, `None` = until shutdown
    pub duration_s: Option<f64>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            imu_sensor_id: "imu0".to_string(),
            camera_sensor_id: "cam0".to_string(),
            imu_rate_hz: 200.0,
            camera_rate_hz: 20.0,
            pose_rate_hz: Some(100.0),
            image_width: 752,
            image_height: 480,
            realtime: true,
            duration_s: None,
        }
    }
}

/// Shutdown policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Request pipeline shutdown when a sensor violates its clock contract
    pub on_fatal: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { on_fatal: true }
    }
}
