//! In-memory checkpoint saver, the single-process default backend.

use crate::{
    checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple},
    error::{CheckpointError, Result},
    traits::CheckpointSaver,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CheckpointEntry {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    config: CheckpointConfig,
    parent_config: Option<CheckpointConfig>,
}

type CheckpointStorage = Arc<RwLock<HashMap<String, Vec<CheckpointEntry>>>>;

/// Thread-safe in-memory checkpoint store.
///
/// Checkpoints are appended per thread id; the latest entry is the head of
/// the lineage. Cheap to clone (shared storage behind an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointSaver {
    storage: CheckpointStorage,
    cancelled: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryCheckpointSaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    pub async fn clear(&self) {
        self.storage.write().await.clear();
        self.cancelled.write().await.clear();
    }
}

fn require_thread_id(config: &CheckpointConfig) -> Result<&str> {
    config
        .thread_id
        .as_deref()
        .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let storage = self.storage.read().await;
        let thread_id = require_thread_id(config)?;

        let Some(entries) = storage.get(thread_id) else {
            return Ok(None);
        };

        let entry = match &config.checkpoint_id {
            Some(checkpoint_id) => entries.iter().find(|e| &e.checkpoint.id == checkpoint_id),
            None => entries.last(),
        };

        Ok(entry.map(|e| CheckpointTuple {
            config: e.config.clone(),
            checkpoint: e.checkpoint.clone(),
            metadata: e.metadata.clone(),
            parent_config: e.parent_config.clone(),
        }))
    }

    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<CheckpointTuple>> {
        let storage = self.storage.read().await;
        let mut results = Vec::new();

        if let Some(entries) = storage.get(thread_id) {
            for entry in entries.iter().rev() {
                results.push(CheckpointTuple {
                    config: entry.config.clone(),
                    checkpoint: entry.checkpoint.clone(),
                    metadata: entry.metadata.clone(),
                    parent_config: entry.parent_config.clone(),
                });
                if let Some(lim) = limit {
                    if results.len() >= lim {
                        break;
                    }
                }
            }
        }

        Ok(results)
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let thread_id = require_thread_id(config)?.to_string();
        let mut storage = self.storage.write().await;

        let entries = storage.entry(thread_id.clone()).or_default();
        let parent_config = entries.last().map(|e| e.config.clone());

        let stored_config = CheckpointConfig::for_thread(&thread_id)
            .with_checkpoint_id(checkpoint.id.clone());

        entries.push(CheckpointEntry {
            checkpoint,
            metadata,
            config: stored_config.clone(),
            parent_config,
        });

        Ok(stored_config)
    }

    async fn cancel(&self, thread_id: &str) -> Result<()> {
        self.cancelled.write().await.insert(thread_id.to_string());
        Ok(())
    }

    async fn is_cancelled(&self, thread_id: &str) -> Result<bool> {
        Ok(self.cancelled.read().await.contains(thread_id))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.storage.write().await.remove(thread_id);
        self.cancelled.write().await.remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointSource, PendingTask};
    use serde_json::json;

    fn checkpoint_with(values: serde_json::Value, next: Vec<PendingTask>) -> Checkpoint {
        Checkpoint::new(values, next)
    }

    #[tokio::test]
    async fn test_put_and_get_latest() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::for_thread("t1");

        saver
            .put(
                &config,
                checkpoint_with(json!({"step": 1}), vec![PendingTask::node("a")]),
                CheckpointMetadata::new().with_step(0),
            )
            .await
            .unwrap();
        saver
            .put(
                &config,
                checkpoint_with(json!({"step": 2}), vec![]),
                CheckpointMetadata::new().with_step(1),
            )
            .await
            .unwrap();

        let tuple = saver.get_tuple(&config).await.unwrap().unwrap();
        assert_eq!(tuple.checkpoint.values, json!({"step": 2}));
        assert!(tuple.checkpoint.is_terminal());
        assert!(tuple.parent_config.is_some());
    }

    #[tokio::test]
    async fn test_get_by_checkpoint_id() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::for_thread("t1");

        let first = checkpoint_with(json!({"step": 1}), vec![]);
        let first_id = first.id.clone();
        saver
            .put(&config, first, CheckpointMetadata::new())
            .await
            .unwrap();
        saver
            .put(
                &config,
                checkpoint_with(json!({"step": 2}), vec![]),
                CheckpointMetadata::new(),
            )
            .await
            .unwrap();

        let by_id = config.clone().with_checkpoint_id(first_id);
        let tuple = saver.get_tuple(&by_id).await.unwrap().unwrap();
        assert_eq!(tuple.checkpoint.values, json!({"step": 1}));
    }

    #[tokio::test]
    async fn test_thread_isolation() {
        let saver = InMemoryCheckpointSaver::new();

        saver
            .put(
                &CheckpointConfig::for_thread("t1"),
                checkpoint_with(json!({"who": "t1"}), vec![]),
                CheckpointMetadata::new().with_source(CheckpointSource::Input),
            )
            .await
            .unwrap();

        let other = saver
            .get_tuple(&CheckpointConfig::for_thread("t2"))
            .await
            .unwrap();
        assert!(other.is_none());
        assert_eq!(saver.thread_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_thread_id_rejected() {
        let saver = InMemoryCheckpointSaver::new();
        let err = saver.get_tuple(&CheckpointConfig::new()).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::for_thread("t1");

        for step in 0..3 {
            saver
                .put(
                    &config,
                    checkpoint_with(json!({"step": step}), vec![]),
                    CheckpointMetadata::new().with_step(step),
                )
                .await
                .unwrap();
        }

        let tuples = saver.list("t1", Some(2)).await.unwrap();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].checkpoint.values, json!({"step": 2}));
        assert_eq!(tuples[1].checkpoint.values, json!({"step": 1}));
    }

    #[tokio::test]
    async fn test_cancellation_flag() {
        let saver = InMemoryCheckpointSaver::new();
        assert!(!saver.is_cancelled("t1").await.unwrap());

        saver.cancel("t1").await.unwrap();
        assert!(saver.is_cancelled("t1").await.unwrap());
        assert!(!saver.is_cancelled("t2").await.unwrap());

        saver.delete_thread("t1").await.unwrap();
        assert!(!saver.is_cancelled("t1").await.unwrap());
    }
}
