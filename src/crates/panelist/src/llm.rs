//! Chat model call contract.
//!
//! The pipeline treats text generation as an opaque external service: it
//! only needs free-text completion over a message list, plus a structured
//! variant that returns JSON conforming to a caller-supplied schema.
//! Provider bindings live behind this trait; tests script it.

use crate::error::Result;
use crate::schema::ChatMessage;
use async_trait::async_trait;
use serde_json::Value;

/// Object-safe chat completion interface.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the conversation with free text.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Complete the conversation with JSON conforming to `schema`.
    async fn invoke_structured(&self, messages: &[ChatMessage], schema: Value) -> Result<Value>;
}
