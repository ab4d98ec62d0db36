//! Pipeline orchestrator - builds mock sources and drives the coordinator.
//!
//! The coordinator runs on plain threads; this module only waits on it from
//! the async runtime and translates signals, limits and timeouts into
//! `drain` / `request_shutdown` calls.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use contracts::PipelineConfig;
use coordinator::{LogBackend, LogFrontend, PipelineCoordinator, PipelineSources};
use ingestion::{MockImuSource, MockPoseSource, MockStereoCamera};
use tracing::{info, warn};

use super::{PipelineStats, RunOutcome};
use crate::error::CliError;

/// Run settings
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Validated pipeline configuration
    pub config: PipelineConfig,

    /// Stop after this many backend packets (None = unlimited)
    pub max_frames: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Progress log interval
    pub progress_interval: Duration,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    settings: RunSettings,
}

impl Pipeline {
    /// Create a new pipeline with the given settings
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// Run until the sources end, a limit is hit or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let settings = self.settings;

        // Initialize Metrics (optional)
        if let Some(port) = settings.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let coordinator = Arc::new(PipelineCoordinator::new(settings.config.clone()));
        let sources = build_sources(&settings.config);
        let backend = LogBackend::new("backend").with_reference(coordinator.reference_poses());

        coordinator
            .start(sources, LogFrontend::new("frontend"), backend)
            .map_err(|e| CliError::pipeline_start(e.to_string()))?;

        info!(
            max_frames = ?settings.max_frames,
            timeout = ?settings.timeout,
            realtime = settings.config.sources.realtime,
            "Pipeline running (MOCK mode)"
        );

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::task::spawn_blocking(move || coordinator.wait_for_completion(None))
        };
        let deadline = async {
            match settings.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(waiter, deadline, shutdown);

        let mut ticker = tokio::time::interval(settings.progress_interval);
        ticker.tick().await;

        let outcome = loop {
            tokio::select! {
                _ = &mut waiter => break RunOutcome::Completed,
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping pipeline...");
                    break RunOutcome::Interrupted;
                }
                _ = &mut deadline => {
                    warn!(timeout = ?settings.timeout, "Pipeline timed out");
                    break RunOutcome::TimedOut;
                }
                _ = ticker.tick() => {
                    let report = coordinator.report();
                    let processed = report.backend.map_or(0, |b| b.processed);
                    info!(
                        frames = report.ingestion.frames_received,
                        samples = report.ingestion.samples_received,
                        dispatched = report.assembler.packets_dispatched,
                        dropped = report.assembler.frames_dropped(),
                        processed,
                        "Pipeline progress"
                    );

                    if let Some(max) = settings.max_frames {
                        if processed >= max {
                            info!(processed, "Reached max frames limit");
                            break RunOutcome::FrameLimit;
                        }
                    }
                }
            }
        };

        // Shutdown
        info!(outcome = %outcome, "Shutting down pipeline...");
        let stopper = Arc::clone(&coordinator);
        tokio::task::spawn_blocking(move || match outcome {
            RunOutcome::Completed => stopper.drain(),
            _ => stopper.request_shutdown(),
        })
        .await
        .map_err(|e| CliError::shutdown(e.to_string()))?;

        let stats = PipelineStats {
            outcome,
            duration: start_time.elapsed(),
            report: coordinator.report(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Build mock sources from configuration, paced against a shared wall-clock origin
fn build_sources(config: &PipelineConfig) -> PipelineSources {
    let sources = &config.sources;
    let origin = Instant::now();

    let mut imu = MockImuSource::from_config(sources);
    let mut camera = MockStereoCamera::from_config(sources);
    let mut poses = MockPoseSource::from_config(sources);

    if sources.realtime {
        imu = imu.paced(origin);
        camera = camera.paced(origin);
        poses = poses.map(|p| p.paced(origin));
    }

    PipelineSources {
        inertial: Box::new(imu),
        frames: Box::new(camera),
        poses: poses.map(|p| Box::new(p) as Box<dyn contracts::PoseSource>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(config: PipelineConfig) -> RunSettings {
        RunSettings {
            config,
            max_frames: None,
            timeout: Some(Duration::from_secs(20)),
            metrics_port: None,
            progress_interval: Duration::from_millis(50),
        }
    }

    fn finite_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.sources.realtime = false;
        config.sources.duration_s = Some(0.5);
        config.sources.image_width = 16;
        config.sources.image_height = 8;
        config
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finite_run_completes() {
        let stats = Pipeline::new(settings(finite_config()))
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.outcome, RunOutcome::Completed);
        assert_eq!(stats.report.ingestion.frames_received, 10);
        assert!(stats.report.assembler.packets_dispatched > 0);
        assert!(stats.report.fatal_error.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_signal_interrupts() {
        let mut config = PipelineConfig::default();
        config.sources.image_width = 16;
        config.sources.image_height = 8;

        let stats = Pipeline::new(settings(config))
            .run(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(stats.outcome, RunOutcome::Interrupted);
        assert_eq!(stats.report.phase, coordinator::Phase::Stopped);
    }
}
