//! InertialSample - inertial ingestion output

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Single gyroscope + accelerometer reading.
///
/// Immutable once inserted into a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    /// Hardware timestamp (ns)
    pub timestamp: Timestamp,

    /// Gyroscope (rad/s)
    pub angular_velocity: Vector3<f64>,

    /// Accelerometer (m/s²)
    pub linear_acceleration: Vector3<f64>,
}

impl InertialSample {
    pub fn new(
        timestamp: Timestamp,
        angular_velocity: Vector3<f64>,
        linear_acceleration: Vector3<f64>,
    ) -> Self {
        Self {
            timestamp,
            angular_velocity,
            linear_acceleration,
        }
    }

    /// Same reading re-stamped at another time.
    pub fn with_timestamp(self, timestamp: Timestamp) -> Self {
        Self { timestamp, ..self }
    }
}
