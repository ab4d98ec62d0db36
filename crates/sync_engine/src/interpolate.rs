//! Linear interpolation between timestamped values.

use contracts::{InertialSample, PoseReference, Timestamp};
use nalgebra::Vector3;

/// Values that can be blended between two neighbours.
///
/// `ratio` is 0.0 at `self` and 1.0 at `other`.
pub trait Interpolate: Sized {
    fn interpolate(&self, other: &Self, ratio: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(&self, other: &Self, ratio: f64) -> Self {
        self + (other - self) * ratio
    }
}

impl Interpolate for Vector3<f64> {
    fn interpolate(&self, other: &Self, ratio: f64) -> Self {
        self.lerp(other, ratio)
    }
}

impl Interpolate for InertialSample {
    fn interpolate(&self, other: &Self, ratio: f64) -> Self {
        let span = (other.timestamp - self.timestamp) as f64;
        InertialSample {
            timestamp: self.timestamp + (span * ratio).round() as Timestamp,
            angular_velocity: self.angular_velocity.lerp(&other.angular_velocity, ratio),
            linear_acceleration: self
                .linear_acceleration
                .lerp(&other.linear_acceleration, ratio),
        }
    }
}

impl Interpolate for PoseReference {
    fn interpolate(&self, other: &Self, ratio: f64) -> Self {
        // try_slerp is undefined for antipodal rotations; snap to the nearer end there
        let orientation = self
            .orientation
            .try_slerp(&other.orientation, ratio, 1.0e-9)
            .unwrap_or(if ratio < 0.5 {
                self.orientation
            } else {
                other.orientation
            });
        PoseReference {
            position: self.position.lerp(&other.position, ratio),
            orientation,
        }
    }
}

/// Position of `t` between `t0` and `t1` as a 0..1 ratio.
#[inline]
pub fn interpolation_ratio(t0: Timestamp, t1: Timestamp, t: Timestamp) -> f64 {
    if t1 == t0 {
        0.0
    } else {
        (t - t0) as f64 / (t1 - t0) as f64
    }
}

/// Value at `t` on the segment between two timestamped values.
#[inline]
pub fn interpolate_at<V: Interpolate>(t0: Timestamp, v0: &V, t1: Timestamp, v1: &V, t: Timestamp) -> V {
    v0.interpolate(v1, interpolation_ratio(t0, t1, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    #[test]
    fn test_interpolation_ratio() {
        assert_eq!(interpolation_ratio(70, 80, 73), 0.3);
        assert_eq!(interpolation_ratio(70, 70, 70), 0.0);
    }

    #[test]
    fn test_inertial_sample_interpolation() {
        let a = InertialSample::new(0, Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 9.0));
        let b = InertialSample::new(10, Vector3::new(0.0, 0.0, 3.0), Vector3::new(0.0, 0.0, 10.0));

        let mid = a.interpolate(&b, 0.5);
        assert_eq!(mid.timestamp, 5);
        assert!((mid.angular_velocity.z - 2.0).abs() < 1e-12);
        assert!((mid.linear_acceleration.z - 9.5).abs() < 1e-12);
    }

    #[test]
    fn test_pose_interpolation_slerps_orientation() {
        let a = PoseReference::new(Vector3::zeros(), UnitQuaternion::identity());
        let b = PoseReference::new(
            Vector3::new(2.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, 1.0),
        );

        let mid = a.interpolate(&b, 0.5);
        assert!((mid.position.x - 1.0).abs() < 1e-12);
        assert!((mid.orientation.euler_angles().2 - 0.5).abs() < 1e-9);
    }
}
