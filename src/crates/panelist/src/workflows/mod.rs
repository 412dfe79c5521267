//! Workflow graph builders.

pub mod interview;
pub mod report;

pub use interview::InterviewGraphBuilder;
pub use report::{FeedbackPolicy, ReportGraphBuilder};
