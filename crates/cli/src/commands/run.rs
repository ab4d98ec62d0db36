//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineConfig;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, RunSettings};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args)?;
    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        imu = %config.sources.imu_sensor_id,
        camera = %config.sources.camera_sensor_id,
        imu_rate_hz = config.sources.imu_rate_hz,
        camera_rate_hz = config.sources.camera_rate_hz,
        max_inertial_wait_ms = config.sync.max_inertial_wait_ms,
        realtime = config.sources.realtime,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let settings = RunSettings {
        config,
        max_frames: (args.max_frames > 0).then_some(args.max_frames),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        progress_interval: Duration::from_secs(args.progress_interval.max(1)),
    };

    info!("Starting pipeline...");
    let stats = Pipeline::new(settings)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        outcome = %stats.outcome,
        packets = stats.report.assembler.packets_dispatched,
        dropped = stats.report.assembler.frames_dropped(),
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Pipeline finished"
    );
    stats.print_summary();

    if let Some(fatal) = &stats.report.fatal_error {
        return Err(CliError::fatal(fatal.clone()).into());
    }

    info!("VIO Sync finished");
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<PipelineConfig> {
    let Some(path) = &args.config else {
        info!("No configuration file given, using defaults");
        return Ok(PipelineConfig::default());
    };

    info!(config = %path.display(), "Loading configuration");
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Apply CLI overrides on top of the file configuration
fn apply_overrides(config: &mut PipelineConfig, args: &RunArgs) {
    if let Some(duration) = args.duration {
        info!(duration_s = duration, "Overriding stream duration from CLI");
        config.sources.duration_s = Some(duration);
    }
    if let Some(wait) = args.max_wait_ms {
        info!(max_inertial_wait_ms = wait, "Overriding inertial wait from CLI");
        config.sync.max_inertial_wait_ms = wait;
    }
    if args.no_realtime {
        config.sources.realtime = false;
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &PipelineConfig) {
    let sources = &config.sources;
    println!("\n=== Configuration Summary ===\n");
    println!("Sources:");
    println!("  Inertial: {} @ {} Hz", sources.imu_sensor_id, sources.imu_rate_hz);
    println!(
        "  Camera: {} @ {} Hz ({}x{})",
        sources.camera_sensor_id, sources.camera_rate_hz, sources.image_width, sources.image_height
    );
    match sources.pose_rate_hz {
        Some(rate) => println!("  Reference poses: {} Hz", rate),
        None => println!("  Reference poses: disabled"),
    }
    match sources.duration_s {
        Some(duration) => println!("  Duration: {:.1}s", duration),
        None => println!("  Duration: until shutdown"),
    }

    println!("\nSync Settings:");
    println!("  Max inertial wait: {} ms", config.sync.max_inertial_wait_ms);
    println!(
        "  Backoff: {}..{} ms",
        config.sync.initial_backoff_ms, config.sync.max_backoff_ms
    );

    println!("\nQueues:");
    println!("  frames: {:?}", config.queues.frames);
    println!("  frontend: {:?}", config.queues.frontend);
    println!("  backend: {:?}", config.queues.backend);
    println!();
}
