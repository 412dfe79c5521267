//! Core graph data structures.
//!
//! A graph is data: a registry of named nodes (stage functions), a table of
//! edges (static successors plus conditional routers), and an entry point.
//! Nothing here executes — compilation hands the structure to
//! [`CompiledGraph`](crate::compiled::CompiledGraph), which drives it.

use crate::error::Result;
use crate::send::RouteResult;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Node identifier - unique name for each node in the graph
pub type NodeId = String;

/// Virtual entry node marking where execution begins
pub const START: &str = "__start__";

/// Virtual terminal node marking successful completion
pub const END: &str = "__end__";

/// Async stage function: current state (or a branch's seed substate) in,
/// partial state update out.
pub type NodeExecutor = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Router function for conditional edges
pub type RouterFn = Arc<dyn Fn(&Value) -> RouteResult + Send + Sync>;

/// Trait for embedding a compiled graph as a single node of a parent graph.
///
/// The sub-graph runs to its own terminal node and returns its final state;
/// the parent merges that state back through the embedding node's declared
/// `writes` filter.
pub trait SubgraphExecutor: Send + Sync {
    /// Execute the sub-graph with the given input state to completion.
    fn invoke(&self, state: Value) -> BoxFuture<'static, Result<Value>>;

    /// Name of this sub-graph, for logging
    fn name(&self) -> &str;
}

/// Edge type defining transitions between nodes
#[derive(Clone)]
pub enum Edge {
    /// Unconditional edge to a specific node
    Direct(NodeId),

    /// Conditional edge with dynamic routing.
    ///
    /// The router inspects the current state and returns the next node, the
    /// terminal sentinel, or a batch of spawn requests (see
    /// [`Send`](crate::send::Send)).
    Conditional {
        router: RouterFn,

        /// All node names the router may return, for validation
        branches: Vec<NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// Node specification: a stage function plus its update filter.
#[derive(Clone)]
pub struct NodeSpec {
    /// Human-readable name for this node
    pub name: String,

    /// Async executor that produces this node's partial state update
    pub executor: NodeExecutor,

    /// Fields this node is allowed to contribute to the shared record.
    /// Empty means unrestricted. Sub-graph nodes declare their fan-in field
    /// here so branch-private state never leaks into the parent record.
    pub writes: Vec<String>,

    /// Set when this node wraps a nested graph
    pub subgraph: Option<Arc<dyn SubgraphExecutor>>,
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("executor", &"<function>")
            .field("writes", &self.writes)
            .field("subgraph", &self.subgraph.as_ref().map(|sg| sg.name()))
            .finish()
    }
}

/// Graph structure: nodes, edges, and the entry point.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// All nodes mapped by their unique IDs
    pub nodes: HashMap<NodeId, NodeSpec>,

    /// Outgoing edges per source node
    pub edges: HashMap<NodeId, Vec<Edge>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId, spec: NodeSpec) {
        self.nodes.insert(id, spec);
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.edges.entry(from).or_default().push(Edge::Direct(to));
    }

    pub fn add_conditional_edge(&mut self, from: NodeId, router: RouterFn, branches: Vec<NodeId>) {
        self.edges
            .entry(from)
            .or_default()
            .push(Edge::Conditional { router, branches });
    }

    /// Validate structural correctness: every edge endpoint must be a known
    /// node or one of the START/END sentinels, and START must have at least
    /// one outgoing edge.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.edges.contains_key(START) {
            return Err("Graph has no entry edge from START".to_string());
        }

        for (from, edges) in &self.edges {
            if !self.nodes.contains_key(from) && from != START {
                return Err(format!("Edge source {} does not exist", from));
            }

            for edge in edges {
                match edge {
                    Edge::Direct(to) => {
                        if !self.nodes.contains_key(to) && to != END {
                            return Err(format!("Edge target {} does not exist", to));
                        }
                    }
                    Edge::Conditional { branches, .. } => {
                        for to in branches {
                            if !self.nodes.contains_key(to) && to != END {
                                return Err(format!("Branch target {} does not exist", to));
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
