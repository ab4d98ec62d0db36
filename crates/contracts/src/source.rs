//! Sensor source traits - ingestion collaborator interfaces
//!
//! Pull-based: each call blocks until the next measurement is available
//! (real hardware or a paced mock) and returns `None` once the stream ends.
//! One source is owned by exactly one ingestion thread.

use crate::{InertialSample, PoseReference, StereoFrame, Timestamp};

/// Inertial measurement stream.
///
/// Implementations must emit strictly increasing timestamps; the buffer
/// rejects anything else as a contract violation.
pub trait InertialSource: Send {
    /// Sensor ID
    fn sensor_id(&self) -> &str;

    /// Next sample, `None` when the stream ended
    fn next_sample(&mut self) -> Option<InertialSample>;
}

/// Stereo camera stream.
pub trait FrameSource: Send {
    /// Sensor ID
    fn sensor_id(&self) -> &str;

    /// Next frame, `None` when the stream ended
    fn next_frame(&mut self) -> Option<StereoFrame>;
}

/// Asynchronous reference pose stream.
pub trait PoseSource: Send {
    /// Sensor ID
    fn sensor_id(&self) -> &str;

    /// Next timestamped pose, `None` when the stream ended
    fn next_pose(&mut self) -> Option<(Timestamp, PoseReference)>;
}
