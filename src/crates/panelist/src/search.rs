//! Web search call contract and document formatting.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Context entry recorded when a search returns nothing
pub const NO_RESULTS_PLACEHOLDER: &str = "[No search results found.]";

/// One retrieved document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchDoc {
    pub url: String,
    pub content: String,
}

/// Object-safe web search interface. Implementations decide the backend
/// and result count; the pipeline only consumes `(url, content)` pairs.
#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn invoke(&self, query: &str) -> Result<Vec<SearchDoc>>;
}

/// Render retrieved documents as one tagged context block. The source URL
/// rides in the tag so downstream prompts can cite it.
pub fn format_documents(docs: &[SearchDoc]) -> String {
    docs.iter()
        .map(|doc| format!("<Document href=\"{}\"/>\n{}\n</Document>", doc.url, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
