//! Caller-facing report service.
//!
//! Wraps the compiled report graph behind a thread-id based API: start a
//! run (which parks at the feedback pause), submit feedback to resume it,
//! poll status, cancel. Every call is stateless with respect to the
//! service itself; runs live entirely in the checkpoint store.

use crate::error::{ReportError, Result};
use crate::llm::ChatModel;
use crate::search::SearchTool;
use crate::workflows::report::ReportGraphBuilder;
use serde_json::{json, Value};
use stategraph_core::{CheckpointConfig, CheckpointSaver, CompiledGraph};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Where a run currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    /// No checkpoints exist for the thread
    NotFound,

    /// Parked at the feedback pause; `analysts` holds the current panel
    Paused { next: Vec<String>, values: Value },

    /// Executing or resumable mid-run
    InProgress { next: Vec<String> },

    /// Terminal; `final_report` is never empty (a fallback string is
    /// substituted if the run somehow finished without one)
    Completed { final_report: String },
}

/// Node name the feedback pause parks on
const FEEDBACK_NODE: &str = "human_feedback";

pub struct ReportService {
    graph: CompiledGraph,
    saver: Arc<dyn CheckpointSaver>,
}

impl ReportService {
    /// Build a service over the default report graph.
    pub fn new(
        llm: Arc<dyn ChatModel>,
        search: Arc<dyn SearchTool>,
        saver: Arc<dyn CheckpointSaver>,
    ) -> Result<Self> {
        let graph = ReportGraphBuilder::new(llm, search, saver.clone()).build()?;
        Ok(Self { graph, saver })
    }

    /// Build a service over an already-configured graph (custom feedback
    /// or branch policies). The graph must carry the same saver.
    pub fn from_graph(graph: CompiledGraph, saver: Arc<dyn CheckpointSaver>) -> Self {
        Self { graph, saver }
    }

    /// Start a run for `topic`. Returns the new thread id once the run has
    /// parked at the feedback pause (or completed, for an empty panel).
    pub async fn start_report_generation(
        &self,
        topic: &str,
        max_analysts: i64,
    ) -> Result<String> {
        let thread_id = Uuid::new_v4().to_string();
        let config = CheckpointConfig::for_thread(&thread_id);

        info!(topic = %topic, thread_id = %thread_id, "starting report pipeline");
        self.graph
            .invoke_with_config(
                Some(json!({
                    "topic": topic,
                    "max_analysts": max_analysts,
                    "human_feedback": "",
                    "sections": [],
                })),
                &config,
            )
            .await?;

        Ok(thread_id)
    }

    /// Apply the caller's feedback at the pause point and drain the run.
    /// Returns the final state record.
    pub async fn submit_feedback(&self, thread_id: &str, feedback: &str) -> Result<Value> {
        let config = CheckpointConfig::for_thread(thread_id);

        if self.graph.get_state(&config).await?.is_none() {
            return Err(ReportError::ThreadNotFound(thread_id.to_string()));
        }

        info!(thread_id = %thread_id, "submitting feedback");
        self.graph
            .update_state(&config, json!({ "human_feedback": feedback }), FEEDBACK_NODE)
            .await?;

        let values = self.graph.invoke_with_config(None, &config).await?;
        Ok(values)
    }

    /// Inspect a run without advancing it.
    pub async fn get_report_status(&self, thread_id: &str) -> Result<ReportStatus> {
        let config = CheckpointConfig::for_thread(thread_id);
        let Some(snapshot) = self.graph.get_state(&config).await? else {
            warn!(thread_id = %thread_id, "no state found for thread");
            return Ok(ReportStatus::NotFound);
        };

        if snapshot.next.is_empty() {
            let final_report = match snapshot.values["final_report"].as_str() {
                Some(report) if !report.is_empty() => report.to_string(),
                _ => {
                    let topic = snapshot.values["topic"].as_str().unwrap_or("unknown topic");
                    warn!(thread_id = %thread_id, "run completed without a final report");
                    format!("Report on '{topic}' generated, but no text found.")
                }
            };
            return Ok(ReportStatus::Completed { final_report });
        }

        if snapshot.next.iter().any(|node| node == FEEDBACK_NODE) {
            return Ok(ReportStatus::Paused {
                next: snapshot.next,
                values: snapshot.values,
            });
        }

        Ok(ReportStatus::InProgress {
            next: snapshot.next,
        })
    }

    /// Cancel a run; subsequent resume and feedback calls are refused.
    pub async fn cancel_report(&self, thread_id: &str) -> Result<()> {
        info!(thread_id = %thread_id, "cancelling report run");
        self.saver
            .cancel(thread_id)
            .await
            .map_err(stategraph_core::GraphError::from)?;
        Ok(())
    }
}
