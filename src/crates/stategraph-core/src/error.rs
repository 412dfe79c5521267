//! Error types for graph construction and execution.
//!
//! Engine-level failures (validation, unknown node references, checkpoint
//! I/O) are fatal and non-retryable. Stage-body failures are wrapped in
//! [`GraphError::NodeExecution`] with the stage name; the checkpoint taken
//! before the failing superstep remains valid, so the caller can retry the
//! run from there.

use stategraph_checkpoint::CheckpointError;
use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur during graph construction or execution
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure is invalid (missing nodes, dangling edges)
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A stage's body failed; the prior checkpoint remains retryable
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    /// General execution failure
    #[error("Execution failed: {0}")]
    Execution(String),

    /// A route or edge referenced a node that does not exist
    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    /// State merge failed
    #[error("State error: {0}")]
    State(#[from] crate::state::StateError),

    /// Checkpoint persistence failed (fatal, non-retryable)
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Another start/resume call currently owns this thread's lineage
    #[error("Thread '{0}' already has a run in flight")]
    ThreadBusy(String),

    /// A fresh start was attempted on a thread paused at an interrupt
    #[error("Thread '{0}' is paused awaiting an external update")]
    Paused(String),

    /// The thread was cancelled; further resume calls are refused
    #[error("Thread '{0}' has been cancelled")]
    Cancelled(String),

    /// Missing or invalid engine configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GraphError {
    /// Wrap an arbitrary stage failure with the stage's name.
    pub fn in_node(node: impl Into<String>, error: impl std::fmt::Display) -> Self {
        GraphError::NodeExecution {
            node: node.into(),
            error: error.to_string(),
        }
    }
}
