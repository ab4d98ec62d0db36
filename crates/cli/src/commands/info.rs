//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    sync: SyncInfo,
    queues: QueueInfo,
    reference_buffer: ReferenceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<SourcesInfo>,
}

#[derive(Serialize)]
struct SyncInfo {
    max_inertial_wait_ms: u64,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline_start_ns: Option<i64>,
    shutdown_on_fatal: bool,
}

#[derive(Serialize)]
struct QueueInfo {
    frames: String,
    frontend: String,
    backend: String,
}

#[derive(Serialize)]
struct ReferenceInfo {
    max_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_span_ms: Option<u64>,
}

#[derive(Serialize)]
struct SourcesInfo {
    imu_sensor_id: String,
    imu_rate_hz: f64,
    camera_sensor_id: String,
    camera_rate_hz: f64,
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pose_rate_hz: Option<f64>,
    realtime: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_s: Option<f64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &PipelineConfig, args: &InfoArgs) -> ConfigInfo {
    let sources = args.sources.then(|| {
        let s = &config.sources;
        SourcesInfo {
            imu_sensor_id: s.imu_sensor_id.clone(),
            imu_rate_hz: s.imu_rate_hz,
            camera_sensor_id: s.camera_sensor_id.clone(),
            camera_rate_hz: s.camera_rate_hz,
            image: format!("{}x{}", s.image_width, s.image_height),
            pose_rate_hz: s.pose_rate_hz,
            realtime: s.realtime,
            duration_s: s.duration_s,
        }
    });

    ConfigInfo {
        version: format!("{:?}", config.version),
        sync: SyncInfo {
            max_inertial_wait_ms: config.sync.max_inertial_wait_ms,
            initial_backoff_ms: config.sync.initial_backoff_ms,
            max_backoff_ms: config.sync.max_backoff_ms,
            pipeline_start_ns: config.sync.pipeline_start_ns,
            shutdown_on_fatal: config.shutdown.on_fatal,
        },
        queues: QueueInfo {
            frames: format!("{:?}", config.queues.frames),
            frontend: format!("{:?}", config.queues.frontend),
            backend: format!("{:?}", config.queues.backend),
        },
        reference_buffer: ReferenceInfo {
            max_entries: config.reference_buffer.max_entries,
            max_span_ms: config.reference_buffer.max_span_ms,
        },
        sources,
    }
}

fn print_config_info(config: &PipelineConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 VIO Sync Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let sync = &config.sync;
    println!("⚙️  Sync Settings");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Max inertial wait: {} ms", sync.max_inertial_wait_ms);
    println!(
        "   ├─ Backoff: {} ms → {} ms",
        sync.initial_backoff_ms, sync.max_backoff_ms
    );
    match sync.pipeline_start_ns {
        Some(start) => println!("   ├─ Pipeline start: {} ns", start),
        None => println!("   ├─ Pipeline start: first frame"),
    }
    println!("   └─ Shutdown on fatal: {}", config.shutdown.on_fatal);

    println!("\n📦 Queues");
    println!("   ├─ frames: {:?}", config.queues.frames);
    println!("   ├─ frontend: {:?}", config.queues.frontend);
    println!("   └─ backend: {:?}", config.queues.backend);

    println!("\n🕒 Reference Buffer");
    println!("   ├─ Max entries: {}", config.reference_buffer.max_entries);
    match config.reference_buffer.max_span_ms {
        Some(span) => println!("   └─ Max span: {} ms", span),
        None => println!("   └─ Max span: unbounded"),
    }

    if args.sources {
        let s = &config.sources;
        println!("\n📷 Sources");
        println!("   ├─ Inertial: {} ({} Hz)", s.imu_sensor_id, s.imu_rate_hz);
        println!(
            "   ├─ Camera: {} ({} Hz, {}x{})",
            s.camera_sensor_id, s.camera_rate_hz, s.image_width, s.image_height
        );
        match s.pose_rate_hz {
            Some(rate) => println!("   ├─ Reference poses: {} Hz", rate),
            None => println!("   ├─ Reference poses: disabled"),
        }
        println!("   └─ Realtime: {}", s.realtime);
    }

    println!();
}
