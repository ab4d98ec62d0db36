//! Pipeline orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Pipeline, RunSettings};
pub use stats::{PipelineStats, RunOutcome};
