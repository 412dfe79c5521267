//! Core checkpoint data structures.
//!
//! A [`Checkpoint`] captures everything the engine needs to resume a run:
//! the merged state record (`values`) and the pending scheduling frontier
//! (`next`). Both are plain serializable data — no closures, no in-memory
//! handles — so a checkpoint written by one process can be resumed by
//! another.
//!
//! Checkpoints are grouped into per-thread lineages. [`CheckpointConfig`]
//! names a lineage (`thread_id`) and optionally a specific snapshot within
//! it (`checkpoint_id`); [`CheckpointTuple`] is a checkpoint together with
//! its config, metadata, and a link to its parent snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Checkpoint ID type
pub type CheckpointId = String;

/// A unit of pending work recorded in a checkpoint's frontier.
///
/// `input` is `None` for ordinary stages (they receive the full state
/// record) and `Some` for dynamically spawned fan-out tasks, which carry
/// their own seeded substate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTask {
    /// Target node to execute
    pub node: String,

    /// Seeded substate for fan-out tasks; `None` means "run on the shared
    /// state record"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

impl PendingTask {
    /// Pending execution of a node against the shared state record
    pub fn node(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            input: None,
        }
    }

    /// Pending execution of a node against a spawned substate
    pub fn send(node: impl Into<String>, input: Value) -> Self {
        Self {
            node: node.into(),
            input: Some(input),
        }
    }
}

/// What produced a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Checkpoint created from the input to a fresh run
    Input,
    /// Checkpoint created after a superstep of the execution loop
    Loop,
    /// Checkpoint created by an external state update (interrupt resume)
    Update,
}

/// Metadata associated with a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointMetadata {
    /// The source of the checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// The step number of the checkpoint
    /// -1 for the initial "input" checkpoint, then 0, 1, 2, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,

    /// Additional custom metadata
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl CheckpointMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// State snapshot at a given point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The version of the checkpoint format (currently 1)
    pub v: i32,

    /// The ID of the checkpoint (unique within its thread)
    pub id: CheckpointId,

    /// The timestamp of the checkpoint
    pub ts: DateTime<Utc>,

    /// The merged state record at the time of the checkpoint
    pub values: Value,

    /// The scheduling frontier: tasks the engine will run next.
    /// Empty means the run has reached its terminal node.
    pub next: Vec<PendingTask>,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create a new checkpoint with a fresh id
    pub fn new(values: Value, next: Vec<PendingTask>) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            values,
            next,
        }
    }

    /// Create an empty checkpoint
    pub fn empty() -> Self {
        Self::new(Value::Object(serde_json::Map::new()), Vec::new())
    }

    /// Whether this checkpoint represents a completed run
    pub fn is_terminal(&self) -> bool {
        self.next.is_empty()
    }
}

/// Configuration for checkpoint operations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointConfig {
    /// Thread ID grouping related checkpoints into a lineage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Specific checkpoint ID to retrieve; `None` means latest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,
}

impl CheckpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config addressing the latest checkpoint of a thread
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            checkpoint_id: None,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<CheckpointId>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }
}

/// A checkpoint together with its config, metadata, and parent link
#[derive(Debug, Clone)]
pub struct CheckpointTuple {
    /// Configuration addressing this checkpoint
    pub config: CheckpointConfig,

    /// The checkpoint itself
    pub checkpoint: Checkpoint,

    /// Metadata associated with the checkpoint
    pub metadata: CheckpointMetadata,

    /// Parent configuration (if any)
    pub parent_config: Option<CheckpointConfig>,
}

impl CheckpointTuple {
    pub fn new(
        config: CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            config,
            checkpoint,
            metadata,
            parent_config: None,
        }
    }

    pub fn with_parent_config(mut self, parent_config: CheckpointConfig) -> Self {
        self.parent_config = Some(parent_config);
        self
    }
}
