//! In-memory replay sources.
//!
//! Feed pre-recorded sequences through the same ingestion path as live
//! sensors. Timestamps are emitted as given; ordering is not checked here.

use contracts::{
    FrameSource, InertialSample, InertialSource, PoseReference, PoseSource, StereoFrame,
    Timestamp,
};

/// Replays a recorded inertial sequence
#[derive(Debug)]
pub struct VecInertialSource {
    sensor_id: String,
    samples: std::vec::IntoIter<InertialSample>,
}

impl VecInertialSource {
    pub fn new(sensor_id: impl Into<String>, samples: Vec<InertialSample>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            samples: samples.into_iter(),
        }
    }

    /// Samples not yet replayed
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl InertialSource for VecInertialSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn next_sample(&mut self) -> Option<InertialSample> {
        self.samples.next()
    }
}

/// Replays a recorded frame sequence
#[derive(Debug)]
pub struct VecFrameSource {
    sensor_id: String,
    frames: std::vec::IntoIter<StereoFrame>,
}

impl VecFrameSource {
    pub fn new(sensor_id: impl Into<String>, frames: Vec<StereoFrame>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            frames: frames.into_iter(),
        }
    }

    /// Image-less frames at the given timestamps, numbered from 0
    pub fn from_timestamps(sensor_id: impl Into<String>, timestamps: &[Timestamp]) -> Self {
        let frames = timestamps
            .iter()
            .enumerate()
            .map(|(id, ts)| StereoFrame::empty(id as u64, *ts))
            .collect();
        Self::new(sensor_id, frames)
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecFrameSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn next_frame(&mut self) -> Option<StereoFrame> {
        self.frames.next()
    }
}

/// Replays a recorded pose trajectory
#[derive(Debug)]
pub struct VecPoseSource {
    sensor_id: String,
    poses: std::vec::IntoIter<(Timestamp, PoseReference)>,
}

impl VecPoseSource {
    pub fn new(sensor_id: impl Into<String>, poses: Vec<(Timestamp, PoseReference)>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            poses: poses.into_iter(),
        }
    }
}

impl PoseSource for VecPoseSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn next_pose(&mut self) -> Option<(Timestamp, PoseReference)> {
        self.poses.next()
    }
}
