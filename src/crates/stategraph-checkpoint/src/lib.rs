//! Checkpoint persistence for stategraph workflows.
//!
//! A checkpoint is a complete, serializable snapshot of a run: the merged
//! state record plus the scheduling frontier (which stages execute next),
//! keyed by a thread identifier. The engine persists one after every
//! superstep, which is what makes long-running graphs suspendable and
//! resumable across process boundaries.
//!
//! The storage backend is an injectable trait ([`CheckpointSaver`]); the
//! in-memory saver ([`InMemoryCheckpointSaver`]) is the single-process
//! default, not an assumption baked into the engine.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod traits;

pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointId, CheckpointMetadata, CheckpointSource,
    CheckpointTuple, PendingTask,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointSaver;
pub use traits::CheckpointSaver;
