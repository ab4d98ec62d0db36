//! Coordinator error types

use thiserror::Error;

/// Coordinator-specific errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// `start` called more than once
    #[error("pipeline already started")]
    AlreadyStarted,

    /// Worker thread could not be spawned
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Ingestion thread could not be started
    #[error("ingestion error: {0}")]
    Ingestion(#[from] ingestion::IngestionError),
}

impl CoordinatorError {
    pub fn spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            source,
        }
    }
}

/// Failure of a single unit of work inside a frontend/backend stage.
///
/// Logged and counted by the stage loop, which then moves on to the next item.
#[derive(Debug, Error)]
pub enum StageError {
    /// Packet could not be processed
    #[error("stage '{stage}' failed: {message}")]
    Processing { stage: String, message: String },

    /// Packet content is unusable (e.g. empty inertial interval)
    #[error("stage '{stage}' rejected input: {message}")]
    InvalidInput { stage: String, message: String },
}

impl StageError {
    pub fn processing(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processing {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
