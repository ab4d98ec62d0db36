//! PoseReference - external pose stream (ground truth, motion capture, GNSS/INS)

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Pose of the body frame in the reference world frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseReference {
    /// Position (m)
    pub position: Vector3<f64>,

    /// Orientation, body to world
    pub orientation: UnitQuaternion<f64>,
}

impl PoseReference {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }
}
