//! Environment-driven settings.
//!
//! Credentials are read by env var name only and never logged; the service
//! wiring decides which provider-specific key a [`ChatModel`](crate::llm::ChatModel)
//! implementation actually needs.

use crate::error::{ReportError, Result};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Default directory for exported reports, relative to the working dir
const DEFAULT_OUTPUT_DIR: &str = "generated_reports";

/// Runtime settings for the report pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Chat model provider identifier (`openai`, `google`, `groq`, ...)
    pub llm_provider: String,

    /// Model name passed to the provider
    pub llm_model: String,

    /// Env var holding the provider's API key
    pub llm_api_key_var: String,

    /// API key for the web-search backend
    pub search_api_key: String,

    /// Maximum results requested per search call
    pub max_search_results: usize,

    /// Directory exported reports are written to
    pub output_dir: PathBuf,
}

impl Settings {
    /// Load settings from the environment.
    ///
    /// `LLM_PROVIDER` and `LLM_MODEL` have defaults; the provider API key
    /// and `SEARCH_API_KEY` must be present.
    pub fn from_env() -> Result<Self> {
        let llm_provider = env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let llm_api_key_var = api_key_var_for(&llm_provider)?;
        if env::var(&llm_api_key_var).is_err() {
            warn!(var = %llm_api_key_var, "provider API key is not set");
        } else {
            info!(var = %llm_api_key_var, "provider API key loaded");
        }

        let search_api_key = env::var("SEARCH_API_KEY")
            .map_err(|_| ReportError::Configuration("SEARCH_API_KEY is not set".to_string()))?;

        let max_search_results = match env::var("MAX_SEARCH_RESULTS") {
            Ok(raw) => raw.parse().map_err(|_| {
                ReportError::Configuration(format!("MAX_SEARCH_RESULTS is not a number: {raw}"))
            })?,
            Err(_) => 3,
        };

        let output_dir = env::var("REPORT_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR));

        info!(provider = %llm_provider, model = %llm_model, "settings loaded");

        Ok(Self {
            llm_provider,
            llm_model,
            llm_api_key_var,
            search_api_key,
            max_search_results,
            output_dir,
        })
    }
}

fn api_key_var_for(provider: &str) -> Result<String> {
    match provider {
        "openai" => Ok("OPENAI_API_KEY".to_string()),
        "google" => Ok("GOOGLE_API_KEY".to_string()),
        "groq" => Ok("GROQ_API_KEY".to_string()),
        other => Err(ReportError::Configuration(format!(
            "unsupported LLM provider '{other}'"
        ))),
    }
}
