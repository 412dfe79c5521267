//! Outer report-generation graph.
//!
//! `create_analysts → (pause: human_feedback) → fan-out interviews →
//! {write_report, write_introduction, write_conclusion} → finalize_report`.
//! The graph compiles with `interrupt_before = ["human_feedback"]`, so a
//! run always parks after persona creation until the caller submits
//! feedback via `update_state`.

use crate::error::ReportError;
use crate::llm::ChatModel;
use crate::prompts;
use crate::schema::{
    report_state_schema, Analyst, ChatMessage, Perspectives, SECTION_SEPARATOR,
};
use crate::search::SearchTool;
use crate::workflows::interview::InterviewGraphBuilder;
use serde_json::{json, Value};
use stategraph_core::{
    BranchPolicy, CheckpointSaver, CompiledGraph, GraphError, RouteResult, Send as SendTask,
    StateGraph, END, START,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Section substituted when no interview produced any output
pub const MISSING_SECTIONS_PLACEHOLDER: &str =
    "No sections generated — please verify interview stage.";

/// What to do with the feedback submitted at the pause point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackPolicy {
    /// Fan out to interviews regardless of feedback content
    Proceed,

    /// Non-blank feedback reruns persona creation (and pauses again);
    /// blank feedback proceeds to the interviews
    #[default]
    RedoOnFeedback,
}

/// Builds the outer report-generation graph.
pub struct ReportGraphBuilder {
    llm: Arc<dyn ChatModel>,
    search: Arc<dyn SearchTool>,
    saver: Arc<dyn CheckpointSaver>,
    feedback_policy: FeedbackPolicy,
    branch_policy: BranchPolicy,
}

impl ReportGraphBuilder {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        search: Arc<dyn SearchTool>,
        saver: Arc<dyn CheckpointSaver>,
    ) -> Self {
        Self {
            llm,
            search,
            saver,
            feedback_policy: FeedbackPolicy::default(),
            branch_policy: BranchPolicy::default(),
        }
    }

    pub fn with_feedback_policy(mut self, policy: FeedbackPolicy) -> Self {
        self.feedback_policy = policy;
        self
    }

    pub fn with_branch_policy(mut self, policy: BranchPolicy) -> Self {
        self.branch_policy = policy;
        self
    }

    /// Construct and compile the report workflow.
    pub fn build(&self) -> Result<CompiledGraph, ReportError> {
        let interview = InterviewGraphBuilder::new(self.llm.clone(), self.search.clone()).build()?;

        let mut graph = StateGraph::with_schema(report_state_schema());

        let llm = self.llm.clone();
        graph.add_node("create_analysts", move |state: Value| {
            let llm = llm.clone();
            Box::pin(async move {
                let topic = state["topic"].as_str().unwrap_or_default().to_string();
                let max_analysts = state["max_analysts"].as_i64().unwrap_or(3);
                let feedback = state["human_feedback"].as_str().unwrap_or_default();

                info!(topic = %topic, max_analysts, "creating analyst personas");
                let prompt = vec![
                    ChatMessage::system(prompts::create_analysts(&topic, feedback, max_analysts)),
                    ChatMessage::human("Generate the set of analysts."),
                ];
                let raw = llm
                    .invoke_structured(&prompt, Perspectives::output_schema())
                    .await
                    .map_err(|e| GraphError::Execution(e.to_string()))?;
                let perspectives: Perspectives = serde_json::from_value(raw)
                    .map_err(|e| GraphError::Execution(format!("bad persona output: {e}")))?;

                info!(count = perspectives.analysts.len(), "analysts created");
                Ok(json!({"analysts": perspectives.analysts}))
            })
        });

        // Pause marker. The engine interrupts before it and resume skips
        // it, so the body never runs in a normal flow.
        graph.add_node("human_feedback", |_state: Value| {
            Box::pin(async move {
                info!("awaiting human feedback");
                Ok(json!({}))
            })
        });

        graph.add_subgraph(
            "conduct_interview",
            Arc::new(interview),
            vec!["sections".to_string()],
        );

        let llm = self.llm.clone();
        graph.add_node("write_report", move |state: Value| {
            let llm = llm.clone();
            Box::pin(async move {
                let topic = state["topic"].as_str().unwrap_or_default().to_string();
                let mut sections = parse_sections(&state);
                if sections.is_empty() {
                    warn!("no sections available, substituting placeholder");
                    sections = vec![MISSING_SECTIONS_PLACEHOLDER.to_string()];
                }

                info!(topic = %topic, section_count = sections.len(), "writing report body");
                let prompt = vec![
                    ChatMessage::system(prompts::write_report(&topic)),
                    ChatMessage::human(sections.join("\n\n")),
                ];
                let body = llm
                    .invoke(&prompt)
                    .await
                    .map_err(|e| GraphError::Execution(e.to_string()))?;

                Ok(json!({"body": body}))
            })
        });

        let llm = self.llm.clone();
        graph.add_node("write_introduction", move |state: Value| {
            let llm = llm.clone();
            Box::pin(async move {
                write_bookend(llm, &state, "introduction", "Write the report introduction").await
            })
        });

        let llm = self.llm.clone();
        graph.add_node("write_conclusion", move |state: Value| {
            let llm = llm.clone();
            Box::pin(async move {
                write_bookend(llm, &state, "conclusion", "Write the report conclusion").await
            })
        });

        graph.add_node("finalize_report", |state: Value| {
            Box::pin(async move {
                let introduction = state["introduction"].as_str().unwrap_or_default();
                let body = state["body"].as_str().unwrap_or_default();
                let conclusion = state["conclusion"].as_str().unwrap_or_default();

                info!("finalizing report");
                let final_report = assemble_final_report(introduction, body, conclusion);
                Ok(json!({"final_report": final_report}))
            })
        });

        let feedback_policy = self.feedback_policy;
        graph.add_edge(START, "create_analysts");
        graph.add_edge("create_analysts", "human_feedback");
        graph.add_conditional_edge(
            "human_feedback",
            move |state: &Value| initiate_all_interviews(state, feedback_policy),
            vec![
                "create_analysts".to_string(),
                "conduct_interview".to_string(),
            ],
        );
        graph.add_edge("conduct_interview", "write_report");
        graph.add_edge("conduct_interview", "write_introduction");
        graph.add_edge("conduct_interview", "write_conclusion");
        graph.add_edge("write_report", "finalize_report");
        graph.add_edge("write_introduction", "finalize_report");
        graph.add_edge("write_conclusion", "finalize_report");
        graph.add_edge("finalize_report", END);

        Ok(graph
            .compile()?
            .with_name("report_generator")
            .with_checkpointer(self.saver.clone())
            .with_branch_policy(self.branch_policy)
            .with_interrupt_before(&["human_feedback"]))
    }
}

/// Fan-out dispatcher, evaluated after the feedback pause. One spawn
/// request per analyst, each seeded with a fresh branch state; the outer
/// record is read, never mutated.
fn initiate_all_interviews(state: &Value, policy: FeedbackPolicy) -> RouteResult {
    let feedback = state["human_feedback"].as_str().unwrap_or_default();
    if policy == FeedbackPolicy::RedoOnFeedback && !feedback.trim().is_empty() {
        info!("feedback supplied, rerunning persona creation");
        return "create_analysts".into();
    }

    let topic = state["topic"].as_str().unwrap_or("Untitled Topic");
    let analysts: Vec<Analyst> =
        serde_json::from_value(state["analysts"].clone()).unwrap_or_default();

    if analysts.is_empty() {
        warn!("no analysts to interview");
        return RouteResult::End;
    }

    RouteResult::Sends(
        analysts
            .into_iter()
            .map(|analyst| {
                SendTask::new(
                    "conduct_interview",
                    json!({
                        "analyst": analyst,
                        "messages": [ChatMessage::human(format!("So, let's discuss about {topic}."))],
                        "max_num_turns": crate::schema::DEFAULT_MAX_TURNS,
                        "context": [],
                        "interview": "",
                        "sections": [],
                    }),
                )
            })
            .collect(),
    )
}

async fn write_bookend(
    llm: Arc<dyn ChatModel>,
    state: &Value,
    field: &str,
    instruction: &str,
) -> Result<Value, GraphError> {
    let topic = state["topic"].as_str().unwrap_or_default().to_string();
    let sections = parse_sections(state).join("\n\n");

    info!(topic = %topic, field, "writing report bookend");
    let prompt = vec![
        ChatMessage::system(prompts::intro_or_conclusion(&topic, &sections)),
        ChatMessage::human(instruction),
    ];
    let text = llm
        .invoke(&prompt)
        .await
        .map_err(|e| GraphError::Execution(e.to_string()))?;

    Ok(json!({field: text}))
}

/// Concatenate the report parts with the fixed separator.
///
/// The body's `## Insights` title is stripped (finalization supplies its
/// own structure) and a trailing `## Sources` block, when present, is
/// split out and re-appended after the conclusion. A sources header that
/// does not sit on its own marker line is left alone with a warning
/// rather than aborting the run.
pub fn assemble_final_report(introduction: &str, body: &str, conclusion: &str) -> String {
    let mut content = body;
    if let Some(stripped) = content.strip_prefix("## Insights") {
        content = stripped.trim_start();
    }

    let (content, sources) = match content.split_once("\n## Sources\n") {
        Some((before, after)) => (before, Some(after)),
        None => {
            if content.contains("## Sources") {
                warn!("sources header present but not on a marker line, keeping body intact");
            }
            (content, None)
        }
    };

    let mut final_report = format!(
        "{introduction}{SECTION_SEPARATOR}{content}{SECTION_SEPARATOR}{conclusion}"
    );
    if let Some(sources) = sources {
        final_report.push_str("\n\n## Sources\n");
        final_report.push_str(sources);
    }
    final_report
}

fn parse_sections(state: &Value) -> Vec<String> {
    serde_json::from_value(state["sections"].clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_strips_insights_and_splits_sources() {
        let report = assemble_final_report(
            "# Title\n\n## Introduction\nIntro.",
            "## Insights\nX\n## Sources\n[1] A",
            "## Conclusion\nDone.",
        );

        assert!(!report.contains("## Insights"));
        assert_eq!(report.matches("X").count(), 1);
        assert_eq!(report.matches("## Sources\n[1] A").count(), 1);
        assert!(report.ends_with("## Sources\n[1] A"));
        assert_eq!(report.matches(SECTION_SEPARATOR).count(), 2);
    }

    #[test]
    fn test_assemble_without_sources() {
        let report = assemble_final_report("Intro.", "## Insights\nBody.", "Done.");
        assert_eq!(
            report,
            format!("Intro.{SECTION_SEPARATOR}Body.{SECTION_SEPARATOR}Done.")
        );
    }

    #[test]
    fn test_assemble_malformed_sources_marker_keeps_body() {
        // Header exists but not as "\n## Sources\n" on its own line.
        let report = assemble_final_report("Intro.", "Body with ## Sources inline", "Done.");
        assert!(report.contains("Body with ## Sources inline"));
        assert_eq!(report.matches(SECTION_SEPARATOR).count(), 2);
    }

    #[test]
    fn test_dispatcher_seeds_one_branch_per_analyst() {
        let state = json!({
            "topic": "AI and jobs",
            "human_feedback": "",
            "analysts": [
                {"name": "A", "role": "r", "affiliation": "x", "description": "d"},
                {"name": "B", "role": "r", "affiliation": "y", "description": "d"},
            ],
        });

        let result = initiate_all_interviews(&state, FeedbackPolicy::RedoOnFeedback);
        let RouteResult::Sends(sends) = result else {
            panic!("expected spawn requests");
        };
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].node(), "conduct_interview");
        assert_eq!(sends[0].arg()["analyst"]["name"], json!("A"));
        assert_eq!(sends[1].arg()["analyst"]["name"], json!("B"));
        assert_eq!(sends[0].arg()["max_num_turns"], json!(2));
        assert_eq!(
            sends[0].arg()["messages"][0]["content"],
            json!("So, let's discuss about AI and jobs.")
        );
    }

    #[test]
    fn test_dispatcher_redo_on_feedback() {
        let state = json!({
            "topic": "AI",
            "human_feedback": "add a skeptic",
            "analysts": [{"name": "A", "role": "r", "affiliation": "x", "description": "d"}],
        });

        let redo = initiate_all_interviews(&state, FeedbackPolicy::RedoOnFeedback);
        assert!(matches!(redo, RouteResult::Node(n) if n == "create_analysts"));

        let proceed = initiate_all_interviews(&state, FeedbackPolicy::Proceed);
        assert!(matches!(proceed, RouteResult::Sends(sends) if sends.len() == 1));
    }

    #[test]
    fn test_dispatcher_empty_panel_ends() {
        let state = json!({"topic": "AI", "human_feedback": "", "analysts": []});
        let result = initiate_all_interviews(&state, FeedbackPolicy::RedoOnFeedback);
        assert!(matches!(result, RouteResult::End));
    }
}
