//! Layered error definitions
//!
//! Categorized by source: config / sensor / io

use thiserror::Error;

use crate::Timestamp;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sensor Errors =====
    /// A sensor stream violated its monotonic clock contract
    #[error("sensor '{sensor_id}' emitted non-monotonic timestamp {timestamp} (last {last})")]
    NonMonotonicSensor {
        sensor_id: String,
        timestamp: Timestamp,
        last: Timestamp,
    },

    /// Sensor payload could not be decoded
    #[error("payload parse error for sensor '{sensor_id}': {message}")]
    PayloadParse { sensor_id: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create payload parse error
    pub fn payload_parse(sensor_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadParse {
            sensor_id: sensor_id.into(),
            message: message.into(),
        }
    }
}
