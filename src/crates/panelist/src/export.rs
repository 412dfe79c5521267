//! Report file export.
//!
//! Binary renderings (PDF, DOCX) are a collaborator's concern; this module
//! fixes the call contract and ships the plain-markdown implementation.

use crate::error::Result;
use chrono::Local;
use regex::Regex;
use std::fs;
#[cfg(test)]
use std::path::Path;
use std::path::PathBuf;
use tracing::info;

/// Writes a finished report to durable storage and returns its path.
pub trait ReportExporter: Send + Sync {
    fn export(&self, report: &str, topic: &str) -> Result<PathBuf>;
}

/// Exports reports as timestamped markdown files under one directory.
pub struct MarkdownExporter {
    output_dir: PathBuf,
}

impl MarkdownExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ReportExporter for MarkdownExporter {
    fn export(&self, report: &str, topic: &str) -> Result<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let file_name = format!("{}_{}.md", topic_slug(topic), timestamp);

        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, report)?;

        info!(path = %path.display(), "report exported");
        Ok(path)
    }
}

/// Filesystem-safe slug for a topic: path-hostile characters become
/// underscores, as do spaces.
fn topic_slug(topic: &str) -> String {
    // The char class is fixed, so the pattern always parses.
    let forbidden = Regex::new(r#"[\\/*?:"<>|]"#).unwrap_or_else(|_| unreachable!());
    forbidden.replace_all(topic, "_").replace(' ', "_")
}
