//! # Ingestion
//!
//! Sensor ingestion collaborators of the VIO sync core.
//!
//! Responsibilities:
//! - Pull readings from sensor sources (mock, replay, or hardware drivers
//!   implementing the `contracts` source traits)
//! - Feed inertial samples into the shared inertial buffer
//! - Push stereo frames into the bounded frame queue (backpressure)
//! - Feed reference poses into the pose temporal buffer
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MockImuSource, MockStereoCamera};
//!
//! let pipeline = IngestionPipeline::new().with_fatal_hook(|err| eprintln!("{err}"));
//! let imu = pipeline.spawn_inertial(Box::new(MockImuSource::new("imu0", 200.0)), buffer)?;
//! let cam = pipeline.spawn_camera(Box::new(MockStereoCamera::new("cam0", 20.0, 752, 480)), frames)?;
//! // ...
//! pipeline.stop_all();
//! ```

mod config;
mod error;
mod mock;
mod pipeline;
mod replay;

// Re-exports
pub use config::{IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use mock::{MockImuSource, MockPoseSource, MockStereoCamera};
pub use pipeline::{FatalHook, IngestionHandle, IngestionPipeline, StreamKind};
pub use replay::{VecFrameSource, VecInertialSource, VecPoseSource};
