//! Scripted service stubs shared by the integration tests.

use async_trait::async_trait;
use panelist::error::Result;
use panelist::llm::ChatModel;
use panelist::schema::ChatMessage;
use panelist::search::{SearchDoc, SearchTool};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Chat model that replays queued responses.
///
/// Free-text calls pop from `replies` (falling back to a canned line that
/// never contains the termination phrase); structured calls pop from
/// `structured` (falling back to a stub search query). Both queues are
/// seeded per test, so a test only scripts the calls it cares about.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    structured: Mutex<VecDeque<Value>>,
    invocations: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            structured: Mutex::new(VecDeque::new()),
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply.into());
    }

    pub fn push_structured(&self, value: Value) {
        self.structured
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(value);
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(&self, _messages: &[ChatMessage]) -> Result<String> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| "Tell me more about that.".to_string()))
    }

    async fn invoke_structured(&self, _messages: &[ChatMessage], _schema: Value) -> Result<Value> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .structured
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| json!({"search_query": "stub query"})))
    }
}

/// Search tool returning the same fixed documents for every query.
pub struct StubSearch {
    docs: Vec<SearchDoc>,
}

impl StubSearch {
    pub fn with_docs(docs: Vec<SearchDoc>) -> Self {
        Self { docs }
    }

    pub fn single(url: &str, content: &str) -> Self {
        Self::with_docs(vec![SearchDoc {
            url: url.to_string(),
            content: content.to_string(),
        }])
    }

    pub fn empty() -> Self {
        Self::with_docs(Vec::new())
    }
}

#[async_trait]
impl SearchTool for StubSearch {
    async fn invoke(&self, _query: &str) -> Result<Vec<SearchDoc>> {
        Ok(self.docs.clone())
    }
}

/// A two-analyst panel in the structured-output shape.
pub fn panel(names: &[&str]) -> Value {
    json!({
        "analysts": names
            .iter()
            .map(|name| json!({
                "name": name,
                "role": "Analyst",
                "affiliation": "Panel",
                "description": format!("{name}'s focus area"),
            }))
            .collect::<Vec<_>>()
    })
}
