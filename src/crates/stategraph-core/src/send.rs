//! Dynamic task creation for fan-out/fan-in patterns.
//!
//! A conditional edge normally routes to a fixed successor. When the number
//! of parallel branches is only known at runtime — one interview per
//! generated persona, say — the router instead returns a list of [`Send`]
//! objects. Each `Send` schedules one independent execution of the target
//! node, seeded with its own substate. The engine runs all sends of a
//! superstep as isolated branches and merges their results back into the
//! shared record in dispatch order, never completion order.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to execute a node once with a dedicated seed state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Send {
    /// Target node to invoke
    node: NodeId,

    /// Seed state passed to the target node instead of the shared record
    arg: Value,
}

impl Send {
    /// Create a new Send targeting `node` with seed state `arg`.
    pub fn new(node: impl Into<NodeId>, arg: Value) -> Self {
        Self {
            node: node.into(),
            arg,
        }
    }

    /// Target node name
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Seed state for the target node
    pub fn arg(&self) -> &Value {
        &self.arg
    }

    /// Consume the Send and return its parts
    pub fn into_parts(self) -> (NodeId, Value) {
        (self.node, self.arg)
    }
}

/// Outcome of a conditional edge's router function.
#[derive(Debug, Clone)]
pub enum RouteResult {
    /// Route to a single named node
    Node(NodeId),

    /// End this branch of the graph
    End,

    /// Spawn one task per Send; an empty list is treated as [`RouteResult::End`]
    Sends(Vec<Send>),
}

impl From<&str> for RouteResult {
    fn from(node: &str) -> Self {
        RouteResult::Node(node.to_string())
    }
}

impl From<String> for RouteResult {
    fn from(node: String) -> Self {
        RouteResult::Node(node)
    }
}
