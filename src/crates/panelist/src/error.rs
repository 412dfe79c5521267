//! Error types for the report pipeline.

use stategraph_core::GraphError;
use thiserror::Error;

/// Result type for report operations
pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors surfaced by the report pipeline and its services.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Missing or invalid settings (env vars, output paths). Fatal,
    /// surfaced immediately, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A generation or search call failed inside a pipeline stage
    #[error("Stage '{stage}' failed: {error}")]
    Generation { stage: String, error: String },

    /// A generation call returned output that could not be parsed into the
    /// expected structure
    #[error("Malformed model output in '{stage}': {error}")]
    MalformedOutput { stage: String, error: String },

    /// Engine-level failure (validation, checkpointing, interrupts)
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No run exists for the given thread id
    #[error("No run found for thread '{0}'")]
    ThreadNotFound(String),
}

impl ReportError {
    /// Wrap an arbitrary failure with the pipeline stage it occurred in.
    pub fn in_stage(stage: impl Into<String>, error: impl std::fmt::Display) -> Self {
        ReportError::Generation {
            stage: stage.into(),
            error: error.to_string(),
        }
    }
}
