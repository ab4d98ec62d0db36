//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{PipelineConfig, QueueCapacity};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    imu_sensor_id: String,
    camera_sensor_id: String,
    reference_poses: bool,
    max_inertial_wait_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    imu_sensor_id: config.sources.imu_sensor_id.clone(),
                    camera_sensor_id: config.sources.camera_sensor_id.clone(),
                    reference_poses: config.sources.pose_rate_hz.is_some(),
                    max_inertial_wait_ms: config.sync.max_inertial_wait_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &PipelineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for (name, capacity) in [
        ("frames", config.queues.frames),
        ("frontend", config.queues.frontend),
        ("backend", config.queues.backend),
    ] {
        if capacity == QueueCapacity::Unbounded {
            warnings.push(format!(
                "queues.{name} is unbounded - no backpressure on this link"
            ));
        }
    }

    // A wait shorter than one inertial period drops nearly every frame
    let imu_period_ms = 1000.0 / config.sources.imu_rate_hz;
    if (config.sync.max_inertial_wait_ms as f64) < imu_period_ms {
        warnings.push(format!(
            "sync.max_inertial_wait_ms ({}) is shorter than one inertial period ({:.1} ms)",
            config.sync.max_inertial_wait_ms, imu_period_ms
        ));
    }

    if config.sources.camera_rate_hz > config.sources.imu_rate_hz {
        warnings.push("camera rate exceeds inertial rate - intervals will be interpolated only".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Inertial sensor: {}", summary.imu_sensor_id);
            println!("  Camera: {}", summary.camera_sensor_id);
            println!("  Reference poses: {}", summary.reference_poses);
            println!("  Max inertial wait: {} ms", summary.max_inertial_wait_ms);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_existing_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[queues]\nbackend = {{ mode = \"unbounded\" }}").unwrap();

        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("queues.backend")));
    }

    #[test]
    fn test_validate_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sync]\nmax_inertial_wait_ms = 0").unwrap();

        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("max_inertial_wait_ms"));
    }
}
