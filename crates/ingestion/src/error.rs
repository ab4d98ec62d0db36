//! Ingestion 错误类型

use contracts::Timestamp;
use sync_engine::BufferError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 传感器时钟违约 (时间戳未严格递增)
    #[error("sensor {sensor_id} violated its clock contract at {timestamp}: {source}")]
    OutOfOrder {
        /// 传感器 ID
        sensor_id: String,
        /// 被拒绝样本的时间戳
        timestamp: Timestamp,
        #[source]
        source: BufferError,
    },

    /// 下游队列已关闭
    #[error("downstream queue closed for sensor {sensor_id}")]
    QueueClosed {
        /// 传感器 ID
        sensor_id: String,
    },

    /// 工作线程 panic
    #[error("ingestion thread for {sensor_id} panicked")]
    WorkerPanicked {
        /// 传感器 ID
        sensor_id: String,
    },

    /// 工作线程创建失败
    #[error("failed to spawn ingestion thread for {sensor_id}: {source}")]
    Spawn {
        /// 传感器 ID
        sensor_id: String,
        #[source]
        source: std::io::Error,
    },
}

impl IngestionError {
    /// 是否为传感器契约违规 (致命)
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestionError::OutOfOrder { .. })
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
