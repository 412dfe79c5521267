//! Multi-persona research report generation.
//!
//! Given a topic, the pipeline synthesizes a panel of analyst personas,
//! pauses for human feedback on the panel, runs each analyst through a
//! web-search-augmented interview with a simulated expert (all interviews
//! in parallel), and assembles the resulting memos into a structured
//! report: introduction, body, conclusion, and consolidated sources.
//!
//! The orchestration machinery — checkpointed superstep execution,
//! interrupt-before pauses, dynamic fan-out — lives in `stategraph-core`;
//! this crate contributes the data model, the two workflow graphs, and the
//! caller-facing [`ReportService`]. Model and search calls sit behind the
//! [`ChatModel`] and [`SearchTool`] traits so the pipeline never knows
//! which provider it is talking to.

pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod prompts;
pub mod schema;
pub mod search;
pub mod service;
pub mod workflows;

pub use config::Settings;
pub use error::{ReportError, Result};
pub use export::{MarkdownExporter, ReportExporter};
pub use llm::ChatModel;
pub use schema::{Analyst, ChatMessage, Perspectives, SearchQuery};
pub use search::{SearchDoc, SearchTool};
pub use service::{ReportService, ReportStatus};
pub use workflows::{FeedbackPolicy, InterviewGraphBuilder, ReportGraphBuilder};
