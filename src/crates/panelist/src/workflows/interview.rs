//! Interview sub-graph.
//!
//! One compiled instance of this graph runs per analyst, seeded with its
//! own branch state: `ask_question → search_context → generate_answer`,
//! looping until the turn limit is hit or the analyst signs off with the
//! termination phrase, then `save_transcript → write_section`. The branch's
//! single `sections` entry is the only field that survives fan-in to the
//! parent record.

use crate::error::ReportError;
use crate::llm::ChatModel;
use crate::prompts;
use crate::schema::{
    interview_state_schema, render_transcript, Analyst, ChatMessage, SearchQuery, EXPERT_NAME,
    TERMINATION_PHRASE,
};
use crate::search::{format_documents, SearchTool, NO_RESULTS_PLACEHOLDER};
use serde_json::{json, Value};
use stategraph_core::{
    CompiledGraph, GraphError, RouteResult, StateGraph, END, START,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the per-analyst interview graph.
pub struct InterviewGraphBuilder {
    llm: Arc<dyn ChatModel>,
    search: Arc<dyn SearchTool>,
}

impl InterviewGraphBuilder {
    pub fn new(llm: Arc<dyn ChatModel>, search: Arc<dyn SearchTool>) -> Self {
        Self { llm, search }
    }

    /// Construct and compile the interview workflow.
    pub fn build(&self) -> Result<CompiledGraph, ReportError> {
        let mut graph = StateGraph::with_schema(interview_state_schema());

        let llm = self.llm.clone();
        graph.add_node("ask_question", move |state: Value| {
            let llm = llm.clone();
            Box::pin(async move {
                let analyst = parse_analyst(&state)?;
                let messages = parse_messages(&state);

                info!(analyst = %analyst.name, "generating analyst question");
                let mut prompt = vec![ChatMessage::system(prompts::ask_questions(
                    &analyst.persona(),
                ))];
                prompt.extend(messages);

                let question = llm
                    .invoke(&prompt)
                    .await
                    .map_err(|e| GraphError::Execution(e.to_string()))?;

                Ok(json!({"messages": [ChatMessage::ai(question)]}))
            })
        });

        let llm = self.llm.clone();
        let search = self.search.clone();
        graph.add_node("search_context", move |state: Value| {
            let llm = llm.clone();
            let search = search.clone();
            Box::pin(async move {
                let messages = parse_messages(&state);

                let mut prompt = vec![ChatMessage::system(prompts::generate_search_query())];
                prompt.extend(messages);
                let raw = llm
                    .invoke_structured(&prompt, SearchQuery::output_schema())
                    .await
                    .map_err(|e| GraphError::Execution(e.to_string()))?;
                let query: SearchQuery = serde_json::from_value(raw)
                    .map_err(|e| GraphError::Execution(format!("bad search query output: {e}")))?;

                info!(query = %query.search_query, "searching for context");
                let docs = search
                    .invoke(&query.search_query)
                    .await
                    .map_err(|e| GraphError::Execution(e.to_string()))?;

                if docs.is_empty() {
                    warn!(query = %query.search_query, "search returned no results");
                    return Ok(json!({"context": [NO_RESULTS_PLACEHOLDER]}));
                }

                Ok(json!({"context": [format_documents(&docs)]}))
            })
        });

        let llm = self.llm.clone();
        graph.add_node("generate_answer", move |state: Value| {
            let llm = llm.clone();
            Box::pin(async move {
                let analyst = parse_analyst(&state)?;
                let messages = parse_messages(&state);
                let context = parse_context(&state).join("\n\n");

                info!(analyst = %analyst.name, "generating expert answer");
                let mut prompt = vec![ChatMessage::system(prompts::generate_answer(
                    &analyst.persona(),
                    &context,
                ))];
                prompt.extend(messages);

                let answer = llm
                    .invoke(&prompt)
                    .await
                    .map_err(|e| GraphError::Execution(e.to_string()))?;

                Ok(json!({"messages": [ChatMessage::ai_named(answer, EXPERT_NAME)]}))
            })
        });

        graph.add_node("save_transcript", |state: Value| {
            Box::pin(async move {
                let messages = parse_messages(&state);
                info!(message_count = messages.len(), "saving interview transcript");
                Ok(json!({"interview": render_transcript(&messages)}))
            })
        });

        let llm = self.llm.clone();
        graph.add_node("write_section", move |state: Value| {
            let llm = llm.clone();
            Box::pin(async move {
                let analyst = parse_analyst(&state)?;
                let context = parse_context(&state).join("\n\n");

                info!(analyst = %analyst.name, "writing report section");
                let prompt = vec![
                    ChatMessage::system(prompts::write_section(&analyst.description)),
                    ChatMessage::human(format!(
                        "Use this source to write your section: {context}"
                    )),
                ];

                let section = llm
                    .invoke(&prompt)
                    .await
                    .map_err(|e| GraphError::Execution(e.to_string()))?;

                Ok(json!({"sections": [section]}))
            })
        });

        graph.add_edge(START, "ask_question");
        graph.add_edge("ask_question", "search_context");
        graph.add_edge("search_context", "generate_answer");
        graph.add_conditional_edge(
            "generate_answer",
            route_messages,
            vec!["ask_question".to_string(), "save_transcript".to_string()],
        );
        graph.add_edge("save_transcript", "write_section");
        graph.add_edge("write_section", END);

        Ok(graph.compile()?.with_name("conduct_interview"))
    }
}

/// Decide whether the interview continues after an expert answer.
///
/// The expert-answer count against `max_num_turns` bounds every interview
/// even when the termination phrase never appears; the phrase check looks
/// at the analyst's latest question, two positions back from the answer
/// just appended.
fn route_messages(state: &Value) -> RouteResult {
    let messages = parse_messages(state);
    let max_turns = state["max_num_turns"]
        .as_i64()
        .unwrap_or(crate::schema::DEFAULT_MAX_TURNS);

    let expert_turns = messages.iter().filter(|m| m.is_from(EXPERT_NAME)).count() as i64;
    if expert_turns >= max_turns {
        return "save_transcript".into();
    }

    if messages.len() >= 2 {
        let last_question = &messages[messages.len() - 2];
        if last_question.content.contains(TERMINATION_PHRASE) {
            return "save_transcript".into();
        }
    }

    "ask_question".into()
}

fn parse_analyst(state: &Value) -> Result<Analyst, GraphError> {
    serde_json::from_value(state["analyst"].clone())
        .map_err(|e| GraphError::Execution(format!("missing or malformed analyst: {e}")))
}

fn parse_messages(state: &Value) -> Vec<ChatMessage> {
    serde_json::from_value(state["messages"].clone()).unwrap_or_default()
}

fn parse_context(state: &Value) -> Vec<String> {
    serde_json::from_value(state["context"].clone()).unwrap_or_default()
}
