//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `PipelineConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("pipeline.toml")).unwrap();
//! println!("Max inertial wait: {} ms", config.sync.max_inertial_wait_ms);
//! ```

mod parser;
mod validator;

pub use contracts::PipelineConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<PipelineConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an in-memory configuration
    pub fn validate(config: &PipelineConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize PipelineConfig to TOML string
    pub fn to_toml(config: &PipelineConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize PipelineConfig to JSON string
    pub fn to_json(config: &PipelineConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::QueueCapacity;
    use std::io::Write;

    const PIPELINE_TOML: &str = r#"
[sync]
max_inertial_wait_ms = 150
initial_backoff_ms = 2
max_backoff_ms = 16

[queues]
frames = { mode = "bounded", capacity = 3 }
frontend = { mode = "unbounded" }

[reference_buffer]
max_entries = 256
max_span_ms = 5000

[sources]
imu_sensor_id = "imu_left"
camera_sensor_id = "stereo"
imu_rate_hz = 400.0
camera_rate_hz = 30.0
duration_s = 2.5
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(PIPELINE_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.sync.max_inertial_wait_ms, 150);
        assert_eq!(config.queues.frames, QueueCapacity::bounded(3));
        assert_eq!(config.queues.frontend, QueueCapacity::Unbounded);
        assert_eq!(config.sources.camera_sensor_id, "stereo");
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(PIPELINE_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.queues.frontend, config2.queues.frontend);
        assert_eq!(config.reference_buffer.max_span_ms, config2.reference_buffer.max_span_ms);
        assert_eq!(config.sources.duration_s, config2.sources.duration_s);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(PIPELINE_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.sources.imu_sensor_id, config2.sources.imu_sensor_id);
        assert_eq!(config.queues.frames, config2.queues.frames);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[sync]
initial_backoff_ms = 40
max_backoff_ms = 20
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_backoff_ms"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(PIPELINE_TOML.as_bytes()).unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.sources.imu_rate_hz, 400.0);
    }

    #[test]
    fn test_load_from_path_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"), "got: {err}");
    }

    #[test]
    fn test_load_from_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load_from_path(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }
}
