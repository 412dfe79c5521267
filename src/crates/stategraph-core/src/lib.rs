//! Stateful, resumable graph orchestration.
//!
//! Workflows are directed graphs of async stages threading one JSON state
//! record. The engine adds what a plain task runner lacks:
//!
//! - **Declarative merging** — a [`StateSchema`] gives each field a merge
//!   policy (overwrite or append), so concurrent stages compose without
//!   coordinating.
//! - **Dynamic fan-out** — a router can spawn N parallel executions of one
//!   node ([`Send`]), each with its own seed state, merged back in dispatch
//!   order.
//! - **Checkpointed execution** — with a [`CheckpointSaver`] attached, every
//!   superstep persists a resumable snapshot; runs survive pauses, crashes,
//!   and process restarts.
//! - **Human-in-the-loop interrupts** — execution parks before designated
//!   nodes and only an explicit [`update_state`](CompiledGraph::update_state)
//!   moves it forward.
//!
//! Build with [`StateGraph`], execute with [`CompiledGraph`].

pub mod builder;
pub mod compiled;
pub mod error;
pub mod graph;
pub mod send;
pub mod state;

pub use builder::StateGraph;
pub use compiled::{BranchPolicy, CompiledGraph, StateSnapshot};
pub use error::{GraphError, Result};
pub use graph::{NodeId, SubgraphExecutor, END, START};
pub use send::{RouteResult, Send};
pub use state::{AppendReducer, OverwriteReducer, Reducer, StateSchema, StateError};

pub use stategraph_checkpoint::{
    CheckpointConfig, CheckpointSaver, CheckpointSource, InMemoryCheckpointSaver, PendingTask,
};
