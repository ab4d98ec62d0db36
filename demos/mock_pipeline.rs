//! Mock Pipeline Example
//!
//! Drives the coordinator directly with mock sources and two custom stages:
//! a frontend integrating gyro rates over each inertial interval and a
//! backend printing the accumulated heading.
//!
//! Run with: cargo run -p demos --bin mock_pipeline [config.toml]

use std::path::Path;
use std::time::{Duration, Instant};

use config_loader::ConfigLoader;
use contracts::time::nsec_to_sec;
use contracts::{PipelineConfig, PoseSource, SynchronizedPacket};
use coordinator::{BackendStage, FrontendStage, PipelineCoordinator, PipelineSources, StageError};
use ingestion::{MockImuSource, MockPoseSource, MockStereoCamera};
use nalgebra::{UnitQuaternion, Vector3};
use observability::{LogFormat, ObservabilityConfig};

/// Rotation increment over one packet
struct Increment {
    frame_id: u64,
    dt: f64,
    rotation: UnitQuaternion<f64>,
}

struct GyroFrontend;

impl FrontendStage for GyroFrontend {
    type Output = Increment;

    fn name(&self) -> &str {
        "gyro_frontend"
    }

    fn process(&mut self, packet: SynchronizedPacket) -> Result<Increment, StageError> {
        let rotation = packet
            .inertial_interval
            .windows(2)
            .fold(UnitQuaternion::identity(), |acc, pair| {
                let dt = nsec_to_sec(pair[1].timestamp - pair[0].timestamp);
                let rate = (pair[0].angular_velocity + pair[1].angular_velocity) * 0.5;
                acc * UnitQuaternion::from_scaled_axis(rate * dt)
            });

        Ok(Increment {
            frame_id: packet.frame.frame_id,
            dt: nsec_to_sec(packet.interval_duration()),
            rotation,
        })
    }
}

struct HeadingBackend {
    orientation: UnitQuaternion<f64>,
    elapsed: f64,
}

impl BackendStage<Increment> for HeadingBackend {
    fn name(&self) -> &str {
        "heading_backend"
    }

    fn process(&mut self, input: Increment) -> Result<(), StageError> {
        self.orientation *= input.rotation;
        self.elapsed += input.dt;

        if input.frame_id % 20 == 0 {
            let (roll, pitch, yaw) = self.orientation.euler_angles();
            tracing::info!(
                frame_id = input.frame_id,
                t = format!("{:.2}", self.elapsed),
                roll = format!("{:.3}", roll),
                pitch = format!("{:.3}", pitch),
                yaw = format!("{:.3}", yaw),
                "Integrated heading"
            );
        }
        Ok(())
    }

    fn finish(&mut self) {
        let axis = self
            .orientation
            .axis()
            .map(|a| a.into_inner())
            .unwrap_or_else(Vector3::z);
        tracing::info!(
            elapsed_s = self.elapsed,
            angle_rad = self.orientation.angle(),
            axis = ?axis.as_slice(),
            "Backend finished"
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Compact,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    tracing::info!("Starting Mock Pipeline Demo");

    // ==== Stage 1: Use default config or load from file ====
    let config = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading pipeline config");
        ConfigLoader::load_from_path(Path::new(&path))?
    } else {
        demo_config()
    };

    // ==== Stage 2: Build sources ====
    let origin = Instant::now();
    let pace = config.sources.realtime;
    let imu = MockImuSource::from_config(&config.sources);
    let camera = MockStereoCamera::from_config(&config.sources);
    let poses = MockPoseSource::from_config(&config.sources);

    let sources = if pace {
        PipelineSources {
            inertial: Box::new(imu.paced(origin)),
            frames: Box::new(camera.paced(origin)),
            poses: poses.map(|p| Box::new(p.paced(origin)) as Box<dyn PoseSource>),
        }
    } else {
        PipelineSources {
            inertial: Box::new(imu),
            frames: Box::new(camera),
            poses: poses.map(|p| Box::new(p) as Box<dyn PoseSource>),
        }
    };

    // ==== Stage 3: Start Pipeline ====
    let coordinator = PipelineCoordinator::new(config);
    coordinator.start(
        sources,
        GyroFrontend,
        HeadingBackend {
            orientation: UnitQuaternion::identity(),
            elapsed: 0.0,
        },
    )?;

    // ==== Stage 4: Wait for the sources to run out ====
    if !coordinator.wait_for_completion(Some(Duration::from_secs(30))) {
        tracing::warn!("Pipeline timed out, forcing shutdown");
        coordinator.request_shutdown();
    } else {
        coordinator.drain();
    }

    println!("{}", coordinator.report());
    Ok(())
}

fn demo_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.sources.duration_s = Some(5.0);
    config.sources.image_width = 64;
    config.sources.image_height = 48;
    config.sync.pipeline_start_ns = Some(0);
    config
}
