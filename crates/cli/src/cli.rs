//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// VIO Sync - stereo visual-inertial temporal synchronization pipeline
#[derive(Parser, Debug)]
#[command(
    name = "vio-sync",
    author,
    version,
    about = "Stereo VIO temporal synchronization pipeline",
    long_about = "Pairs every stereo frame with the inertial samples covering the interval\n\
                  since the previous frame and feeds the packets through a frontend and\n\
                  backend stage. Runs against mock sensor sources."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "VIO_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "VIO_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the synchronization pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "VIO_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override stream length in seconds
    #[arg(long, env = "VIO_SYNC_DURATION")]
    pub duration: Option<f64>,

    /// Override the maximum inertial coverage wait (milliseconds)
    #[arg(long)]
    pub max_wait_ms: Option<u64>,

    /// Emit mock readings as fast as possible instead of at their nominal rate
    #[arg(long)]
    pub no_realtime: bool,

    /// Stop after the backend processed this many packets (0 = unlimited)
    #[arg(long, default_value = "0", env = "VIO_SYNC_MAX_FRAMES")]
    pub max_frames: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "VIO_SYNC_TIMEOUT")]
    pub timeout: u64,

    /// Progress log interval in seconds
    #[arg(long, default_value = "1")]
    pub progress_interval: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "VIO_SYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show mock source details
    #[arg(long)]
    pub sources: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl Cli {
    /// Logging setup for the chosen verbosity; `RUST_LOG` still takes
    /// precedence. The metrics exporter is started by `run`, not here.
    pub fn observability_config(&self) -> observability::ObservabilityConfig {
        let level = match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            _ => "trace",
        };
        observability::ObservabilityConfig {
            log_format: self.log_format.clone().into(),
            metrics_port: None,
            default_log_level: level.to_string(),
        }
    }
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
