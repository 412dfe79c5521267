//! Compiled graph execution engine.
//!
//! Execution proceeds in supersteps. Each superstep takes the checkpointed
//! scheduling frontier, runs every pending task concurrently, merges their
//! partial updates into the shared record in dispatch order, evaluates
//! outgoing edges to form the next frontier, and persists a new checkpoint.
//! The frontier at the top of the loop is therefore always already durable:
//! pausing at an interrupt, crashing mid-run, or resuming in another
//! process all pick up from the same snapshot.
//!
//! Fan-out tasks (spawned via [`Send`](crate::send::Send)) carry their own
//! seed substate in the frontier and run isolated from the shared record;
//! only the fields declared in the target node's `writes` list are merged
//! back, in the order the tasks were dispatched.

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Graph, NodeId, SubgraphExecutor, END, START};
use crate::send::RouteResult;
use crate::state::StateSchema;
use futures::future::BoxFuture;
use serde_json::Value;
use stategraph_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, CheckpointSource,
    PendingTask,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// How the engine reacts when a spawned fan-out branch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchPolicy {
    /// Abort the superstep on the first failed branch. The checkpoint taken
    /// before the superstep remains valid for retry.
    #[default]
    FailFast,

    /// Log the failure, drop the branch's contribution, and continue with
    /// the surviving branches.
    BestEffort,
}

/// Externally visible view of a thread's latest (or a specific) checkpoint.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// The merged state record
    pub values: Value,

    /// Names of the nodes pending in the frontier; empty means the run
    /// reached its terminal node
    pub next: Vec<String>,

    /// Config addressing this exact snapshot
    pub config: CheckpointConfig,

    /// Checkpoint metadata (source, step)
    pub metadata: CheckpointMetadata,

    /// RFC 3339 creation timestamp
    pub created_at: String,

    /// Config of the parent snapshot, if any
    pub parent_config: Option<CheckpointConfig>,
}

/// Releases a thread's in-flight slot when the run finishes.
struct ThreadGuard {
    threads: Arc<Mutex<HashSet<String>>>,
    thread_id: String,
}

impl ThreadGuard {
    fn acquire(threads: Arc<Mutex<HashSet<String>>>, thread_id: &str) -> Result<Self> {
        {
            let mut set = threads.lock().unwrap_or_else(|e| e.into_inner());
            if !set.insert(thread_id.to_string()) {
                return Err(GraphError::ThreadBusy(thread_id.to_string()));
            }
        }
        Ok(Self {
            threads,
            thread_id: thread_id.to_string(),
        })
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        let mut set = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.thread_id);
    }
}

/// An executable graph produced by [`StateGraph::compile`](crate::builder::StateGraph::compile).
#[derive(Clone)]
pub struct CompiledGraph {
    graph: Graph,
    schema: Arc<StateSchema>,
    checkpoint_saver: Option<Arc<dyn CheckpointSaver>>,
    interrupt_before: HashSet<NodeId>,
    branch_policy: BranchPolicy,
    active_threads: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl CompiledGraph {
    pub(crate) fn new(graph: Graph, schema: StateSchema) -> Self {
        Self {
            graph,
            schema: Arc::new(schema),
            checkpoint_saver: None,
            interrupt_before: HashSet::new(),
            branch_policy: BranchPolicy::default(),
            active_threads: Arc::new(Mutex::new(HashSet::new())),
            name: "graph".to_string(),
        }
    }

    /// Attach a checkpoint saver. Required for [`invoke_with_config`],
    /// [`update_state`], and [`get_state`].
    ///
    /// [`invoke_with_config`]: Self::invoke_with_config
    /// [`update_state`]: Self::update_state
    /// [`get_state`]: Self::get_state
    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpoint_saver = Some(saver);
        self
    }

    /// Pause execution whenever any of the named nodes is about to run.
    /// The pause point is checkpointed; only [`update_state`](Self::update_state)
    /// moves the thread past it.
    pub fn with_interrupt_before(mut self, nodes: &[&str]) -> Self {
        self.interrupt_before = nodes.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set the failure policy for spawned fan-out branches.
    pub fn with_branch_policy(mut self, policy: BranchPolicy) -> Self {
        self.branch_policy = policy;
        self
    }

    /// Name used when this graph is embedded as a sub-graph and in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Run the graph once without persistence: seed an empty record with
    /// `input`, execute to the terminal node, return the final record.
    ///
    /// Interrupts configured via `with_interrupt_before` cannot be resumed
    /// on this path; use [`invoke_with_config`](Self::invoke_with_config)
    /// with a checkpointer for pausable runs.
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        let mut values = Value::Object(serde_json::Map::new());
        if !input.is_null() {
            self.schema.apply(&mut values, &input)?;
        }
        let frontier = self.successors(START, &values)?;
        self.run_loop(values, frontier, -1, None).await
    }

    /// Run or resume a checkpointed thread.
    ///
    /// `Some(input)` starts a fresh run: the thread must have no lineage or
    /// a terminal one, otherwise [`GraphError::Paused`] is returned so an
    /// in-progress run is never silently clobbered. `None` resumes from the
    /// thread's latest checkpoint; resuming a thread parked at an interrupt
    /// is a no-op that returns the checkpointed values unchanged.
    #[tracing::instrument(skip_all, fields(graph = %self.name))]
    pub async fn invoke_with_config(
        &self,
        input: Option<Value>,
        config: &CheckpointConfig,
    ) -> Result<Value> {
        let saver = self.require_saver()?;
        let thread_id = Self::require_thread_id(config)?;

        if saver.is_cancelled(&thread_id).await? {
            return Err(GraphError::Cancelled(thread_id));
        }

        let _guard = ThreadGuard::acquire(self.active_threads.clone(), &thread_id)?;
        let existing = saver.get_tuple(config).await?;

        match (input, existing) {
            (Some(input), existing) => {
                if let Some(tuple) = &existing {
                    if !tuple.checkpoint.is_terminal() {
                        return Err(GraphError::Paused(thread_id));
                    }
                }

                let mut values = Value::Object(serde_json::Map::new());
                self.schema.apply(&mut values, &input)?;
                let frontier = self.successors(START, &values)?;

                self.persist(
                    &saver,
                    &thread_id,
                    &values,
                    &frontier,
                    -1,
                    CheckpointSource::Input,
                )
                .await?;

                info!(graph = %self.name, thread_id = %thread_id, "starting run");
                self.run_loop(values, frontier, -1, Some((saver, thread_id)))
                    .await
            }
            (None, Some(tuple)) => {
                let step = tuple.metadata.step.unwrap_or(-1);
                info!(
                    graph = %self.name,
                    thread_id = %thread_id,
                    step,
                    pending = tuple.checkpoint.next.len(),
                    "resuming run"
                );
                self.run_loop(
                    tuple.checkpoint.values,
                    tuple.checkpoint.next,
                    step,
                    Some((saver, thread_id)),
                )
                .await
            }
            (None, None) => Err(GraphError::Execution(format!(
                "no checkpoint to resume for thread '{}'",
                thread_id
            ))),
        }
    }

    /// Apply an external state update as if node `as_node` had produced it,
    /// then checkpoint the node's successors as the new frontier.
    ///
    /// This is the only way past an interrupt: the update is merged through
    /// the schema (honoring `as_node`'s `writes` filter), `as_node`'s
    /// outgoing edges are evaluated against the merged record, and the
    /// resulting frontier is persisted. A subsequent resume call picks up
    /// from there.
    #[tracing::instrument(skip_all, fields(graph = %self.name, as_node))]
    pub async fn update_state(
        &self,
        config: &CheckpointConfig,
        update: Value,
        as_node: &str,
    ) -> Result<CheckpointConfig> {
        let saver = self.require_saver()?;
        let thread_id = Self::require_thread_id(config)?;

        if saver.is_cancelled(&thread_id).await? {
            return Err(GraphError::Cancelled(thread_id));
        }

        let _guard = ThreadGuard::acquire(self.active_threads.clone(), &thread_id)?;

        let tuple = saver.get_tuple(config).await?.ok_or_else(|| {
            GraphError::Execution(format!("no checkpoint to update for thread '{}'", thread_id))
        })?;

        let spec = self
            .graph
            .nodes
            .get(as_node)
            .ok_or_else(|| GraphError::UnknownNode(as_node.to_string()))?;

        let mut values = tuple.checkpoint.values;
        let filtered = filter_writes(&update, &spec.writes);
        self.schema.apply(&mut values, &filtered)?;

        let frontier = self.successors(as_node, &values)?;
        let step = tuple.metadata.step.unwrap_or(-1) + 1;

        info!(
            graph = %self.name,
            thread_id = %thread_id,
            as_node,
            step,
            pending = frontier.len(),
            "applied external state update"
        );

        self.persist(
            &saver,
            &thread_id,
            &values,
            &frontier,
            step,
            CheckpointSource::Update,
        )
        .await
    }

    /// Inspect a thread's latest checkpoint (or a specific one when
    /// `config.checkpoint_id` is set) without executing anything.
    pub async fn get_state(&self, config: &CheckpointConfig) -> Result<Option<StateSnapshot>> {
        let saver = self.require_saver()?;
        let tuple = match saver.get_tuple(config).await? {
            Some(tuple) => tuple,
            None => return Ok(None),
        };

        let mut next = Vec::new();
        for task in &tuple.checkpoint.next {
            if !next.contains(&task.node) {
                next.push(task.node.clone());
            }
        }

        Ok(Some(StateSnapshot {
            values: tuple.checkpoint.values,
            next,
            config: tuple.config,
            metadata: tuple.metadata,
            created_at: tuple.checkpoint.ts.to_rfc3339(),
            parent_config: tuple.parent_config,
        }))
    }

    /// The superstep loop. Invariant: the frontier passed in (and every
    /// frontier assigned at the bottom) has already been checkpointed when
    /// a persistence context is present, so pausing or crashing here never
    /// loses scheduling state.
    async fn run_loop(
        &self,
        mut values: Value,
        mut frontier: Vec<PendingTask>,
        mut step: i64,
        persist: Option<(Arc<dyn CheckpointSaver>, String)>,
    ) -> Result<Value> {
        loop {
            if frontier.is_empty() {
                return Ok(values);
            }

            if let Some(task) = frontier
                .iter()
                .find(|t| self.interrupt_before.contains(&t.node))
            {
                info!(graph = %self.name, node = %task.node, "pausing before node");
                return Ok(values);
            }

            if let Some((saver, thread_id)) = &persist {
                if saver.is_cancelled(thread_id).await? {
                    return Err(GraphError::Cancelled(thread_id.clone()));
                }
            }

            let mut pending = Vec::with_capacity(frontier.len());
            for task in &frontier {
                let spec = self
                    .graph
                    .nodes
                    .get(&task.node)
                    .ok_or_else(|| GraphError::UnknownNode(task.node.clone()))?;
                let input = task.input.clone().unwrap_or_else(|| values.clone());
                debug!(graph = %self.name, node = %task.node, seeded = task.input.is_some(), "dispatching");
                pending.push((spec.executor)(input));
            }

            // Branches run concurrently but merge in dispatch order, so the
            // merged record is independent of completion timing.
            let results = futures::future::join_all(pending).await;

            let mut next_frontier: Vec<PendingTask> = Vec::new();
            for (task, result) in frontier.iter().zip(results) {
                match result {
                    Ok(update) => {
                        let spec = &self.graph.nodes[&task.node];
                        let filtered = filter_writes(&update, &spec.writes);
                        self.schema.apply(&mut values, &filtered)?;
                        for successor in self.successors(&task.node, &values)? {
                            push_task(&mut next_frontier, successor);
                        }
                    }
                    Err(err) => {
                        let is_branch = task.input.is_some();
                        if self.branch_policy == BranchPolicy::BestEffort && is_branch {
                            warn!(
                                graph = %self.name,
                                node = %task.node,
                                error = %err,
                                "branch failed, continuing without its contribution"
                            );
                            for successor in self.successors(&task.node, &values)? {
                                push_task(&mut next_frontier, successor);
                            }
                        } else {
                            return Err(GraphError::in_node(&task.node, err));
                        }
                    }
                }
            }

            step += 1;
            if let Some((saver, thread_id)) = &persist {
                self.persist(
                    saver,
                    thread_id,
                    &values,
                    &next_frontier,
                    step,
                    CheckpointSource::Loop,
                )
                .await?;
            }

            frontier = next_frontier;
        }
    }

    /// Evaluate `node`'s outgoing edges against the current record and
    /// return the pending tasks they schedule.
    fn successors(&self, node: &str, values: &Value) -> Result<Vec<PendingTask>> {
        let mut tasks = Vec::new();

        let Some(edges) = self.graph.edges.get(node) else {
            return Ok(tasks);
        };

        for edge in edges {
            match edge {
                Edge::Direct(to) => {
                    if to != END {
                        push_task(&mut tasks, PendingTask::node(to.clone()));
                    }
                }
                Edge::Conditional { router, .. } => match router(values) {
                    RouteResult::Node(to) => {
                        if to != END {
                            if !self.graph.nodes.contains_key(&to) {
                                return Err(GraphError::UnknownNode(to));
                            }
                            push_task(&mut tasks, PendingTask::node(to));
                        }
                    }
                    RouteResult::End => {}
                    RouteResult::Sends(sends) => {
                        if sends.is_empty() {
                            warn!(
                                graph = %self.name,
                                node,
                                "router returned zero spawn requests, ending branch"
                            );
                        }
                        for send in sends {
                            let (to, arg) = send.into_parts();
                            if !self.graph.nodes.contains_key(&to) {
                                return Err(GraphError::UnknownNode(to));
                            }
                            tasks.push(PendingTask::send(to, arg));
                        }
                    }
                },
            }
        }

        Ok(tasks)
    }

    async fn persist(
        &self,
        saver: &Arc<dyn CheckpointSaver>,
        thread_id: &str,
        values: &Value,
        next: &[PendingTask],
        step: i64,
        source: CheckpointSource,
    ) -> Result<CheckpointConfig> {
        let checkpoint = Checkpoint::new(values.clone(), next.to_vec());
        let metadata = CheckpointMetadata::new().with_source(source).with_step(step);
        let config = saver
            .put(&CheckpointConfig::for_thread(thread_id), checkpoint, metadata)
            .await?;
        Ok(config)
    }

    fn require_saver(&self) -> Result<Arc<dyn CheckpointSaver>> {
        self.checkpoint_saver
            .clone()
            .ok_or_else(|| GraphError::Configuration("no checkpoint saver attached".to_string()))
    }

    fn require_thread_id(config: &CheckpointConfig) -> Result<String> {
        config
            .thread_id
            .clone()
            .ok_or_else(|| GraphError::Configuration("config is missing a thread_id".to_string()))
    }
}

impl SubgraphExecutor for CompiledGraph {
    fn invoke(&self, state: Value) -> BoxFuture<'static, Result<Value>> {
        let graph = self.clone();
        Box::pin(async move { graph.invoke(state).await })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Restrict an update to the fields a node declared; an empty declaration
/// means unrestricted.
fn filter_writes(update: &Value, writes: &[String]) -> Value {
    if writes.is_empty() {
        return update.clone();
    }
    match update.as_object() {
        Some(obj) => Value::Object(
            obj.iter()
                .filter(|(key, _)| writes.iter().any(|w| w == *key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        None => update.clone(),
    }
}

/// Add a task to a frontier, collapsing duplicate plain tasks so that
/// several predecessors converging on one join node schedule it once.
/// Seeded fan-out tasks are never collapsed.
fn push_task(frontier: &mut Vec<PendingTask>, task: PendingTask) {
    if task.input.is_none()
        && frontier
            .iter()
            .any(|t| t.input.is_none() && t.node == task.node)
    {
        return;
    }
    frontier.push(task);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateGraph;
    use crate::send::Send;
    use crate::state::{AppendReducer, StateSchema};
    use serde_json::json;
    use stategraph_checkpoint::InMemoryCheckpointSaver;
    use std::time::Duration;

    fn log_schema() -> StateSchema {
        StateSchema::new().with_field("log", Box::new(AppendReducer))
    }

    #[tokio::test]
    async fn test_linear_flow() {
        let mut graph = StateGraph::with_schema(log_schema());
        graph.add_node("first", |_state| {
            Box::pin(async move { Ok(json!({"log": ["first"]})) })
        });
        graph.add_node("second", |_state| {
            Box::pin(async move { Ok(json!({"log": ["second"]})) })
        });
        graph.add_edge(START, "first");
        graph.add_edge("first", "second");
        graph.add_edge("second", END);

        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(json!({"log": []})).await.unwrap();
        assert_eq!(result["log"], json!(["first", "second"]));
    }

    #[tokio::test]
    async fn test_conditional_routing() {
        let mut graph = StateGraph::new();
        graph.add_node("decide", |_state| Box::pin(async move { Ok(json!({})) }));
        graph.add_node("left", |_state| {
            Box::pin(async move { Ok(json!({"took": "left"})) })
        });
        graph.add_node("right", |_state| {
            Box::pin(async move { Ok(json!({"took": "right"})) })
        });
        graph.add_edge(START, "decide");
        graph.add_conditional_edge(
            "decide",
            |state: &Value| {
                if state["flag"] == json!(true) {
                    "left".into()
                } else {
                    "right".into()
                }
            },
            vec!["left".to_string(), "right".to_string()],
        );
        graph.add_edge("left", END);
        graph.add_edge("right", END);

        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(json!({"flag": true})).await.unwrap();
        assert_eq!(result["took"], json!("left"));

        let result = compiled.invoke(json!({"flag": false})).await.unwrap();
        assert_eq!(result["took"], json!("right"));
    }

    #[tokio::test]
    async fn test_fan_out_merges_in_dispatch_order() {
        // Workers finish in reverse dispatch order; results must still land
        // in dispatch order.
        let mut graph = StateGraph::with_schema(
            StateSchema::new().with_field("results", Box::new(AppendReducer)),
        );
        graph.add_node("plan", |_state| Box::pin(async move { Ok(json!({})) }));
        graph.add_node_writes(
            "worker",
            |seed: Value| {
                Box::pin(async move {
                    let index = seed["index"].as_u64().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis((3 - index) * 30)).await;
                    Ok(json!({"results": [index], "scratch": "private"}))
                })
            },
            vec!["results".to_string()],
        );
        graph.add_node("collect", |_state| Box::pin(async move { Ok(json!({})) }));
        graph.add_edge(START, "plan");
        graph.add_conditional_edge(
            "plan",
            |_state: &Value| {
                RouteResult::Sends(
                    (0..3)
                        .map(|i| Send::new("worker", json!({"index": i})))
                        .collect(),
                )
            },
            vec!["worker".to_string()],
        );
        graph.add_edge("worker", "collect");
        graph.add_edge("collect", END);

        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(json!({})).await.unwrap();

        assert_eq!(result["results"], json!([0, 1, 2]));
        // Branch-private fields never reach the shared record.
        assert!(result.get("scratch").is_none());
    }

    #[tokio::test]
    async fn test_join_node_runs_once_after_fan_out() {
        let mut graph = StateGraph::with_schema(
            StateSchema::new().with_field("joins", Box::new(AppendReducer)),
        );
        graph.add_node("plan", |_state| Box::pin(async move { Ok(json!({})) }));
        graph.add_node_writes(
            "worker",
            |_seed| Box::pin(async move { Ok(json!({})) }),
            vec![],
        );
        graph.add_node("join", |_state| {
            Box::pin(async move { Ok(json!({"joins": ["ran"]})) })
        });
        graph.add_edge(START, "plan");
        graph.add_conditional_edge(
            "plan",
            |_state: &Value| {
                RouteResult::Sends(vec![
                    Send::new("worker", json!({"i": 0})),
                    Send::new("worker", json!({"i": 1})),
                    Send::new("worker", json!({"i": 2})),
                ])
            },
            vec!["worker".to_string()],
        );
        graph.add_edge("worker", "join");
        graph.add_edge("join", END);

        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(json!({})).await.unwrap();
        assert_eq!(result["joins"], json!(["ran"]));
    }

    #[tokio::test]
    async fn test_empty_sends_ends_branch() {
        let mut graph = StateGraph::new();
        graph.add_node("plan", |_state| {
            Box::pin(async move { Ok(json!({"planned": true})) })
        });
        graph.add_node("worker", |_seed| {
            Box::pin(async move { Ok(json!({"worked": true})) })
        });
        graph.add_edge(START, "plan");
        graph.add_conditional_edge(
            "plan",
            |_state: &Value| RouteResult::Sends(vec![]),
            vec!["worker".to_string()],
        );
        graph.add_edge("worker", END);

        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(json!({})).await.unwrap();
        assert_eq!(result["planned"], json!(true));
        assert!(result.get("worked").is_none());
    }

    #[tokio::test]
    async fn test_branch_failure_fail_fast() {
        let compiled = failing_branch_graph(BranchPolicy::FailFast);
        let err = compiled.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, GraphError::NodeExecution { node, .. } if node == "worker"));
    }

    #[tokio::test]
    async fn test_branch_failure_best_effort_keeps_survivors() {
        let compiled = failing_branch_graph(BranchPolicy::BestEffort);
        let result = compiled.invoke(json!({})).await.unwrap();
        assert_eq!(result["results"], json!([0, 2]));
    }

    fn failing_branch_graph(policy: BranchPolicy) -> CompiledGraph {
        let mut graph = StateGraph::with_schema(
            StateSchema::new().with_field("results", Box::new(AppendReducer)),
        );
        graph.add_node("plan", |_state| Box::pin(async move { Ok(json!({})) }));
        graph.add_node_writes(
            "worker",
            |seed: Value| {
                Box::pin(async move {
                    let index = seed["index"].as_u64().unwrap_or(0);
                    if index == 1 {
                        Err(GraphError::Execution("boom".to_string()))
                    } else {
                        Ok(json!({"results": [index]}))
                    }
                })
            },
            vec!["results".to_string()],
        );
        graph.add_edge(START, "plan");
        graph.add_conditional_edge(
            "plan",
            |_state: &Value| {
                RouteResult::Sends(
                    (0..3)
                        .map(|i| Send::new("worker", json!({"index": i})))
                        .collect(),
                )
            },
            vec!["worker".to_string()],
        );
        graph.add_edge("worker", END);
        graph.compile().unwrap().with_branch_policy(policy)
    }

    fn interruptible_graph(saver: Arc<dyn CheckpointSaver>) -> CompiledGraph {
        let mut graph = StateGraph::with_schema(log_schema());
        graph.add_node("draft", |_state| {
            Box::pin(async move { Ok(json!({"log": ["draft"]})) })
        });
        graph.add_node("gate", |_state| Box::pin(async move { Ok(json!({})) }));
        graph.add_node("publish", |state: Value| {
            Box::pin(async move {
                let note = state["feedback"].as_str().unwrap_or("none").to_string();
                Ok(json!({"log": [format!("publish:{note}")]}))
            })
        });
        graph.add_edge(START, "draft");
        graph.add_edge("draft", "gate");
        graph.add_edge("gate", "publish");
        graph.add_edge("publish", END);

        graph
            .compile()
            .unwrap()
            .with_checkpointer(saver)
            .with_interrupt_before(&["gate"])
    }

    #[tokio::test]
    async fn test_interrupt_pause_and_resume() {
        let saver: Arc<dyn CheckpointSaver> = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = interruptible_graph(saver);
        let config = CheckpointConfig::for_thread("t1");

        // Run halts before the gate node.
        let paused = compiled
            .invoke_with_config(Some(json!({"log": []})), &config)
            .await
            .unwrap();
        assert_eq!(paused["log"], json!(["draft"]));

        let snapshot = compiled.get_state(&config).await.unwrap().unwrap();
        assert_eq!(snapshot.next, vec!["gate".to_string()]);

        // Resuming without an update is a no-op.
        let still_paused = compiled.invoke_with_config(None, &config).await.unwrap();
        assert_eq!(still_paused["log"], json!(["draft"]));
        let snapshot = compiled.get_state(&config).await.unwrap().unwrap();
        assert_eq!(snapshot.next, vec!["gate".to_string()]);

        // The update moves past the gate; resume completes the run.
        compiled
            .update_state(&config, json!({"feedback": "lgtm"}), "gate")
            .await
            .unwrap();
        let done = compiled.invoke_with_config(None, &config).await.unwrap();
        assert_eq!(done["log"], json!(["draft", "publish:lgtm"]));

        let snapshot = compiled.get_state(&config).await.unwrap().unwrap();
        assert!(snapshot.next.is_empty());
    }

    #[tokio::test]
    async fn test_fresh_start_on_paused_thread_is_refused() {
        let saver: Arc<dyn CheckpointSaver> = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = interruptible_graph(saver);
        let config = CheckpointConfig::for_thread("t1");

        compiled
            .invoke_with_config(Some(json!({"log": []})), &config)
            .await
            .unwrap();

        let err = compiled
            .invoke_with_config(Some(json!({"log": []})), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Paused(thread) if thread == "t1"));
    }

    #[tokio::test]
    async fn test_resume_across_engine_instances() {
        // A second engine built over the same saver picks up the lineage.
        let saver: Arc<dyn CheckpointSaver> = Arc::new(InMemoryCheckpointSaver::new());
        let config = CheckpointConfig::for_thread("t1");

        let first = interruptible_graph(saver.clone());
        first
            .invoke_with_config(Some(json!({"log": []})), &config)
            .await
            .unwrap();
        drop(first);

        let second = interruptible_graph(saver);
        second
            .update_state(&config, json!({"feedback": "ship it"}), "gate")
            .await
            .unwrap();
        let done = second.invoke_with_config(None, &config).await.unwrap();
        assert_eq!(done["log"], json!(["draft", "publish:ship it"]));
    }

    #[tokio::test]
    async fn test_repeated_update_is_idempotent() {
        let saver: Arc<dyn CheckpointSaver> = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = interruptible_graph(saver);
        let config = CheckpointConfig::for_thread("t1");

        compiled
            .invoke_with_config(Some(json!({"log": []})), &config)
            .await
            .unwrap();

        compiled
            .update_state(&config, json!({"feedback": "lgtm"}), "gate")
            .await
            .unwrap();
        compiled
            .update_state(&config, json!({"feedback": "lgtm"}), "gate")
            .await
            .unwrap();

        let snapshot = compiled.get_state(&config).await.unwrap().unwrap();
        assert_eq!(snapshot.values["feedback"], json!("lgtm"));
        assert_eq!(snapshot.next, vec!["publish".to_string()]);

        let done = compiled.invoke_with_config(None, &config).await.unwrap();
        assert_eq!(done["log"], json!(["draft", "publish:lgtm"]));
    }

    #[tokio::test]
    async fn test_cancelled_thread_refuses_resume() {
        let saver = Arc::new(InMemoryCheckpointSaver::new());
        let compiled = interruptible_graph(saver.clone());
        let config = CheckpointConfig::for_thread("t1");

        compiled
            .invoke_with_config(Some(json!({"log": []})), &config)
            .await
            .unwrap();

        saver.cancel("t1").await.unwrap();

        let err = compiled.invoke_with_config(None, &config).await.unwrap_err();
        assert!(matches!(err, GraphError::Cancelled(thread) if thread == "t1"));

        let err = compiled
            .update_state(&config, json!({"feedback": "x"}), "gate")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Cancelled(thread) if thread == "t1"));
    }

    #[tokio::test]
    async fn test_concurrent_runs_on_one_thread_are_rejected() {
        let saver: Arc<dyn CheckpointSaver> = Arc::new(InMemoryCheckpointSaver::new());

        let mut graph = StateGraph::new();
        graph.add_node("slow", |_state| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!({"done": true}))
            })
        });
        graph.add_edge(START, "slow");
        graph.add_edge("slow", END);

        let compiled = graph.compile().unwrap().with_checkpointer(saver);
        let config = CheckpointConfig::for_thread("t1");

        let racer = compiled.clone();
        let racer_config = config.clone();
        let handle = tokio::spawn(async move {
            racer
                .invoke_with_config(Some(json!({})), &racer_config)
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = compiled
            .invoke_with_config(Some(json!({})), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::ThreadBusy(thread) if thread == "t1"));

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_subgraph_writes_filter() {
        // Inner graph builds up private dialogue state; the parent only
        // sees the field the embedding node declares.
        let mut inner = StateGraph::with_schema(
            StateSchema::new().with_field("turns", Box::new(AppendReducer)),
        );
        inner.add_node("talk", |_state| {
            Box::pin(async move { Ok(json!({"turns": ["q", "a"], "summary": "done"})) })
        });
        inner.add_edge(START, "talk");
        inner.add_edge("talk", END);
        let inner = inner.compile().unwrap().with_name("dialogue");

        let mut outer = StateGraph::with_schema(
            StateSchema::new().with_field("summary", Box::new(AppendReducer)),
        );
        outer.add_subgraph("dialogue", Arc::new(inner), vec!["summary".to_string()]);
        outer.add_edge(START, "dialogue");
        outer.add_edge("dialogue", END);

        let compiled = outer.compile().unwrap();
        let result = compiled.invoke(json!({"topic": "x"})).await.unwrap();

        assert_eq!(result["summary"], json!(["done"]));
        assert!(result.get("turns").is_none());
    }

    #[test]
    fn test_filter_writes() {
        let update = json!({"a": 1, "b": 2});
        assert_eq!(filter_writes(&update, &[]), update);
        assert_eq!(
            filter_writes(&update, &["a".to_string()]),
            json!({"a": 1})
        );
    }
}
