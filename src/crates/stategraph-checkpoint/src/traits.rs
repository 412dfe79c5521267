//! Storage trait for checkpoint backends.

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::Result,
};
use async_trait::async_trait;

/// Pluggable storage backend for checkpoint lineages.
///
/// One instance is created per process (typically at service start) and
/// shared across every compiled graph that needs persistence. Backends must
/// support concurrent writes for *distinct* thread ids; serializing writers
/// within a single thread id is the engine's job, not the saver's.
///
/// Cancellation is a storage concern: a cancelled thread id is recorded
/// here so the refusal survives process restarts along with the
/// checkpoints themselves.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch just the checkpoint addressed by `config` (latest when no
    /// `checkpoint_id` is set).
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        Ok(self.get_tuple(config).await?.map(|tuple| tuple.checkpoint))
    }

    /// Fetch the checkpoint tuple addressed by `config`, or `None` when the
    /// thread has no checkpoints yet.
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// List checkpoints for a thread, newest first.
    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<CheckpointTuple>>;

    /// Persist a checkpoint at the head of the thread's lineage.
    ///
    /// Returns a config addressing the stored checkpoint.
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig>;

    /// Mark a thread as cancelled. Further engine calls against the thread
    /// are refused; existing checkpoints are retained.
    async fn cancel(&self, thread_id: &str) -> Result<()>;

    /// Whether a thread has been marked cancelled.
    async fn is_cancelled(&self, thread_id: &str) -> Result<bool>;

    /// Drop a thread's checkpoints. Retention policy is the backend's
    /// concern; the engine never calls this itself.
    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let _ = thread_id;
        Ok(())
    }
}
