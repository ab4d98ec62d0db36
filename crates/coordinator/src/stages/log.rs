//! LogFrontend / LogBackend - summarise packets via tracing
//!
//! Stand-ins for a real visual frontend and estimator: enough work to
//! exercise the handoff chain end to end.

use std::sync::Arc;

use contracts::time::nsec_to_sec;
use contracts::{PoseReference, SynchronizedPacket, Timestamp};
use nalgebra::{UnitQuaternion, Vector3};
use sync_engine::TemporalBuffer;
use tracing::{debug, info, instrument};

use crate::error::StageError;
use crate::stage::{BackendStage, FrontendStage};

/// Per-packet summary produced by [`LogFrontend`]
#[derive(Debug, Clone, PartialEq)]
pub struct FrontendSummary {
    pub sequence: u64,
    pub frame_id: u64,
    pub frame_ts: Timestamp,
    pub interval_start_ts: Timestamp,
    pub sample_count: usize,
    /// Mean accelerometer reading over the interval (m/s²)
    pub mean_acceleration: Vector3<f64>,
    /// Gyro rotation integrated over the interval (midpoint rule)
    pub delta_rotation: UnitQuaternion<f64>,
}

/// Frontend that summarises each packet's inertial interval
pub struct LogFrontend {
    name: String,
}

impl LogFrontend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn summarise(&self, packet: &SynchronizedPacket) -> Result<FrontendSummary, StageError> {
        let samples = &packet.inertial_interval;
        if samples.is_empty() {
            return Err(StageError::invalid_input(
                &self.name,
                format!("packet {} has no inertial samples", packet.sequence),
            ));
        }

        let mean_acceleration = samples
            .iter()
            .fold(Vector3::zeros(), |acc, s| acc + s.linear_acceleration)
            / samples.len() as f64;

        let delta_rotation = samples.windows(2).fold(UnitQuaternion::identity(), |q, w| {
            let dt = nsec_to_sec(w[1].timestamp - w[0].timestamp);
            let omega = (w[0].angular_velocity + w[1].angular_velocity) * 0.5;
            q * UnitQuaternion::from_scaled_axis(omega * dt)
        });

        Ok(FrontendSummary {
            sequence: packet.sequence,
            frame_id: packet.frame.frame_id,
            frame_ts: packet.interval_end_ts,
            interval_start_ts: packet.interval_start_ts,
            sample_count: samples.len(),
            mean_acceleration,
            delta_rotation,
        })
    }
}

impl FrontendStage for LogFrontend {
    type Output = FrontendSummary;

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_frontend_process",
        skip(self, packet),
        fields(stage = %self.name, sequence = packet.sequence)
    )]
    fn process(&mut self, packet: SynchronizedPacket) -> Result<FrontendSummary, StageError> {
        let summary = self.summarise(&packet)?;
        debug!(
            stage = %self.name,
            frame_id = summary.frame_id,
            samples = summary.sample_count,
            interval_ms = contracts::time::as_millis_f64(packet.interval_duration()),
            rotation_rad = summary.delta_rotation.angle(),
            "SynchronizedPacket received"
        );
        Ok(summary)
    }
}

/// Backend that accumulates frontend rotations and pairs them with the
/// reference trajectory when one is available
pub struct LogBackend {
    name: String,
    reference: Option<Arc<TemporalBuffer<PoseReference>>>,
    orientation: UnitQuaternion<f64>,
    processed: u64,
    with_reference: u64,
}

impl LogBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: None,
            orientation: UnitQuaternion::identity(),
            processed: 0,
            with_reference: 0,
        }
    }

    /// Look up reference poses in `buffer`
    pub fn with_reference(mut self, buffer: Arc<TemporalBuffer<PoseReference>>) -> Self {
        self.reference = Some(buffer);
        self
    }

    /// Orientation accumulated from every processed interval
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }

    fn reference_at(&self, ts: Timestamp) -> Option<PoseReference> {
        let buffer = self.reference.as_ref()?;
        buffer
            .get_interpolated(ts)
            .or_else(|| buffer.get_nearest(ts))
    }
}

impl BackendStage<FrontendSummary> for LogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, input: FrontendSummary) -> Result<(), StageError> {
        self.orientation *= input.delta_rotation;
        self.processed += 1;

        match self.reference_at(input.frame_ts) {
            Some(reference) => {
                self.with_reference += 1;
                debug!(
                    stage = %self.name,
                    sequence = input.sequence,
                    position = ?reference.position.as_slice(),
                    heading_error_rad = self.orientation.angle_to(&reference.orientation),
                    "Frame with reference pose"
                );
            }
            None => {
                debug!(stage = %self.name, sequence = input.sequence, "Frame without reference pose");
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        info!(
            stage = %self.name,
            processed = self.processed,
            with_reference = self.with_reference,
            integrated_rotation_rad = self.orientation.angle(),
            "LogBackend closed"
        );
    }
}
