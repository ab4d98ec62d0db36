//! # Coordinator
//!
//! Pipeline coordination module.
//!
//! 负责：
//! - 连接 ingestion 线程、同步 assembler 与 frontend/backend 工作线程
//! - 管理整条链路的生命周期 (start / drain / request_shutdown)
//! - 隔离 stage 失败，不阻塞主链路

pub mod coordinator;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod stage;
pub mod stages;

pub use coordinator::{Phase, PipelineCoordinator, PipelineReport, PipelineSources, ShutdownHandle};
pub use error::{CoordinatorError, StageError};
pub use handle::StageHandle;
pub use metrics::{StageMetrics, StageStats};
pub use stage::{BackendStage, FrontendStage};
pub use stages::{FrontendSummary, LogBackend, LogFrontend};
