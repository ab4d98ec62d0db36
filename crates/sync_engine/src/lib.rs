//! # Sync Engine
//!
//! Temporal synchronization core for stereo visual-inertial odometry.
//!
//! ## Components
//!
//! - [`InertialSampleBuffer`]: ordered IMU samples, interval extraction with
//!   boundary interpolation and purge
//! - [`TemporalBuffer`]: bounded time-indexed buffer for auxiliary streams
//! - [`BlockingQueue`]: stage-to-stage handoff with backpressure and shutdown
//! - [`SyncAssembler`]: pairs each frame with the inertial interval since the
//!   previous frame
//!
//! ## Data flow
//!
//! ```text
//! IMU ──insert──▶ InertialSampleBuffer ◀──extract── SyncAssembler ──push──▶ frontend queue
//! camera ──push──▶ frame queue ──pop─────────────────────▲
//! ```

mod assembler;
mod error;
mod imu_buffer;
pub mod interpolate;
mod metrics;
mod queue;
mod temporal_buffer;

pub use assembler::{
    AssemblerReport, AssemblerState, AssemblyOutcome, DropListener, SyncAssembler,
};
pub use error::{AssemblerError, BufferError, QueueError, TryPushError};
pub use imu_buffer::{InertialBufferStats, InertialSampleBuffer};
pub use interpolate::Interpolate;
pub use metrics::{AssemblerMetrics, AssemblerStats};
pub use queue::BlockingQueue;
pub use temporal_buffer::TemporalBuffer;
