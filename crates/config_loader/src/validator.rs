//! 配置校验模块
//!
//! 校验规则：
//! - 有界队列容量 > 0
//! - max_inertial_wait_ms > 0，initial_backoff_ms <= max_backoff_ms
//! - reference_buffer.max_entries > 0
//! - 传感器频率 > 0，图像尺寸非零
//! - sensor_id 非空且互不相同

use contracts::{ContractError, PipelineConfig, QueueCapacity};

/// 校验 PipelineConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &PipelineConfig) -> Result<(), ContractError> {
    validate_sync(config)?;
    validate_queues(config)?;
    validate_reference_buffer(config)?;
    validate_sources(config)?;
    Ok(())
}

/// 校验同步策略
fn validate_sync(config: &PipelineConfig) -> Result<(), ContractError> {
    let sync = &config.sync;

    if sync.max_inertial_wait_ms == 0 {
        return Err(ContractError::config_validation(
            "sync.max_inertial_wait_ms",
            "max_inertial_wait_ms must be > 0",
        ));
    }

    if sync.initial_backoff_ms == 0 {
        return Err(ContractError::config_validation(
            "sync.initial_backoff_ms",
            "initial_backoff_ms must be > 0",
        ));
    }

    if sync.initial_backoff_ms > sync.max_backoff_ms {
        return Err(ContractError::config_validation(
            "sync.initial_backoff_ms / sync.max_backoff_ms",
            format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                sync.initial_backoff_ms, sync.max_backoff_ms
            ),
        ));
    }

    Ok(())
}

/// 校验队列容量
fn validate_queues(config: &PipelineConfig) -> Result<(), ContractError> {
    let queues = &config.queues;
    for (name, capacity) in [
        ("frames", queues.frames),
        ("frontend", queues.frontend),
        ("backend", queues.backend),
    ] {
        if capacity == QueueCapacity::bounded(0) {
            return Err(ContractError::config_validation(
                format!("queues.{name}.capacity"),
                "bounded queue capacity must be > 0",
            ));
        }
    }
    Ok(())
}

fn validate_reference_buffer(config: &PipelineConfig) -> Result<(), ContractError> {
    let buffer = &config.reference_buffer;

    if buffer.max_entries == 0 {
        return Err(ContractError::config_validation(
            "reference_buffer.max_entries",
            "max_entries must be > 0",
        ));
    }

    if buffer.max_span_ms == Some(0) {
        return Err(ContractError::config_validation(
            "reference_buffer.max_span_ms",
            "max_span_ms must be > 0 when set",
        ));
    }

    Ok(())
}

/// 校验传感器源配置
fn validate_sources(config: &PipelineConfig) -> Result<(), ContractError> {
    let sources = &config.sources;

    for (field, id) in [
        ("sources.imu_sensor_id", &sources.imu_sensor_id),
        ("sources.camera_sensor_id", &sources.camera_sensor_id),
    ] {
        if id.is_empty() {
            return Err(ContractError::config_validation(field, "sensor id cannot be empty"));
        }
    }

    if sources.imu_sensor_id == sources.camera_sensor_id {
        return Err(ContractError::config_validation(
            "sources.camera_sensor_id",
            format!("duplicate sensor_id '{}'", sources.camera_sensor_id),
        ));
    }

    let rates = [
        ("sources.imu_rate_hz", Some(sources.imu_rate_hz)),
        ("sources.camera_rate_hz", Some(sources.camera_rate_hz)),
        ("sources.pose_rate_hz", sources.pose_rate_hz),
    ];
    for (field, rate) in rates {
        if let Some(rate) = rate {
            if !(rate > 0.0 && rate.is_finite()) {
                return Err(ContractError::config_validation(
                    field,
                    format!("rate must be > 0, got {rate}"),
                ));
            }
        }
    }

    if sources.image_width == 0 || sources.image_height == 0 {
        return Err(ContractError::config_validation(
            "sources.image_width / sources.image_height",
            format!(
                "image dimensions must be non-zero, got {}x{}",
                sources.image_width, sources.image_height
            ),
        ));
    }

    if let Some(duration) = sources.duration_s {
        if !(duration > 0.0 && duration.is_finite()) {
            return Err(ContractError::config_validation(
                "sources.duration_s",
                format!("duration_s must be > 0, got {duration}"),
            ));
        }
    }

    Ok(())
}
