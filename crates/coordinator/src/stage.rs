//! Stage traits consumed by the coordinator.
//!
//! A stage owns its state and runs on its own thread; the coordinator feeds
//! it one item at a time and never calls it concurrently.

use contracts::SynchronizedPacket;

use crate::error::StageError;

/// Visual frontend: consumes synchronized packets, produces backend input
pub trait FrontendStage: Send + 'static {
    /// Item handed to the backend
    type Output: Send + 'static;

    /// Stage name for logs and metrics
    fn name(&self) -> &str;

    fn process(&mut self, packet: SynchronizedPacket) -> Result<Self::Output, StageError>;

    /// Called once after the input queue is drained and closed
    fn finish(&mut self) {}
}

/// Estimation backend: consumes frontend output
pub trait BackendStage<I>: Send + 'static {
    /// Stage name for logs and metrics
    fn name(&self) -> &str;

    fn process(&mut self, input: I) -> Result<(), StageError>;

    /// Called once after the input queue is drained and closed
    fn finish(&mut self) {}
}
