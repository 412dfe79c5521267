//! High-level graph builder.
//!
//! [`StateGraph`] is the imperative construction API: register stages,
//! wire edges, declare the state schema, then [`compile`](StateGraph::compile)
//! into an executable [`CompiledGraph`].
//!
//! ```rust
//! use stategraph_core::{StateGraph, StateSchema, AppendReducer, START, END};
//! use serde_json::json;
//!
//! let mut graph = StateGraph::with_schema(
//!     StateSchema::new().with_field("log", Box::new(AppendReducer)),
//! );
//! graph.add_node("step", |_state| {
//!     Box::pin(async move { Ok(json!({"log": ["ran"]})) })
//! });
//! graph.add_edge(START, "step");
//! graph.add_edge("step", END);
//! let compiled = graph.compile().unwrap();
//! ```

use crate::compiled::CompiledGraph;
use crate::error::{GraphError, Result};
use crate::graph::{Graph, NodeExecutor, NodeId, NodeSpec, SubgraphExecutor};
use crate::send::RouteResult;
use crate::state::StateSchema;
use serde_json::Value;
use std::sync::Arc;

/// Builder for stateful workflow graphs.
pub struct StateGraph {
    graph: Graph,
    schema: StateSchema,
}

impl StateGraph {
    /// Create a builder with an empty schema (every field overwrites).
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            schema: StateSchema::new(),
        }
    }

    /// Create a builder with a declared state schema.
    pub fn with_schema(schema: StateSchema) -> Self {
        Self {
            graph: Graph::new(),
            schema,
        }
    }

    /// Register a stage. The executor receives the current state record
    /// (or a spawned branch's seed substate) and returns a partial update.
    pub fn add_node<F>(&mut self, id: impl Into<NodeId>, executor: F) -> &mut Self
    where
        F: Fn(Value) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value>> + Send>>
            + Send
            + Sync
            + 'static,
    {
        self.add_node_writes(id, executor, Vec::new())
    }

    /// Register a stage whose update is filtered to the named fields.
    pub fn add_node_writes<F>(
        &mut self,
        id: impl Into<NodeId>,
        executor: F,
        writes: Vec<String>,
    ) -> &mut Self
    where
        F: Fn(Value) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value>> + Send>>
            + Send
            + Sync
            + 'static,
    {
        let id = id.into();
        let executor: NodeExecutor = Arc::new(move |state| executor(state));
        let spec = NodeSpec {
            name: id.clone(),
            executor,
            writes,
            subgraph: None,
        };
        self.graph.add_node(id, spec);
        self
    }

    /// Embed a compiled graph as a single node.
    ///
    /// The sub-graph runs to completion on each invocation; of its final
    /// state, only the fields named in `writes` are merged back into the
    /// parent record.
    pub fn add_subgraph(
        &mut self,
        id: impl Into<NodeId>,
        subgraph: Arc<dyn SubgraphExecutor>,
        writes: Vec<String>,
    ) -> &mut Self {
        let id = id.into();
        let sg = subgraph.clone();
        let executor: NodeExecutor = Arc::new(move |state| {
            let sg = sg.clone();
            Box::pin(async move { sg.invoke(state).await })
        });
        let spec = NodeSpec {
            name: id.clone(),
            executor,
            writes,
            subgraph: Some(subgraph),
        };
        self.graph.add_node(id, spec);
        self
    }

    /// Add a static successor edge.
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.graph.add_edge(from.into(), to.into());
        self
    }

    /// Add a conditional edge. `branches` lists every node the router may
    /// name, for validation.
    pub fn add_conditional_edge<F>(
        &mut self,
        from: impl Into<NodeId>,
        router: F,
        branches: Vec<NodeId>,
    ) -> &mut Self
    where
        F: Fn(&Value) -> RouteResult + Send + Sync + 'static,
    {
        self.graph
            .add_conditional_edge(from.into(), Arc::new(router), branches);
        self
    }

    /// Validate the structure and produce an executable graph.
    pub fn compile(self) -> Result<CompiledGraph> {
        self.graph.validate().map_err(GraphError::Validation)?;
        Ok(CompiledGraph::new(self.graph, self.schema))
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}
