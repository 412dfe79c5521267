//! Data model and state schemas for the report pipeline.
//!
//! Two state records flow through the graphs: the outer report record and
//! the per-branch interview record. Both are JSON objects governed by a
//! [`StateSchema`]; the constructors here declare each field's merge policy
//! so stage updates compose deterministically.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stategraph_core::{AppendReducer, OverwriteReducer, StateSchema};

/// Phrase an analyst uses to end an interview early
pub const TERMINATION_PHRASE: &str = "Thank you so much for your help!";

/// Expert answers allowed per interview before the router cuts it off
pub const DEFAULT_MAX_TURNS: i64 = 2;

/// Speaker name attached to expert answers
pub const EXPERT_NAME: &str = "expert";

/// Separator between the assembled report's top-level parts
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// One analyst persona on the research panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analyst {
    pub name: String,
    pub role: String,
    pub affiliation: String,
    /// Focus, concerns, and motives; drives the interview questions
    pub description: String,
}

impl Analyst {
    /// Persona brief injected into interview prompts.
    pub fn persona(&self) -> String {
        format!(
            "Name: {}\nRole: {}\nAffiliation: {}\nDescription: {}\n",
            self.name, self.role, self.affiliation, self.description
        )
    }
}

/// Structured-output envelope for persona generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Perspectives {
    pub analysts: Vec<Analyst>,
}

impl Perspectives {
    /// JSON schema handed to the model for structured persona output.
    pub fn output_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "analysts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "role": {"type": "string"},
                            "affiliation": {"type": "string"},
                            "description": {"type": "string"}
                        },
                        "required": ["name", "role", "affiliation", "description"]
                    }
                }
            },
            "required": ["analysts"]
        })
    }
}

/// Structured-output envelope for search query generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    pub search_query: String,
}

impl SearchQuery {
    pub fn output_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_query": {"type": "string"}
            },
            "required": ["search_query"]
        })
    }
}

/// One turn of dialogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// `system`, `human`, or `ai`
    pub role: String,

    pub content: String,

    /// Optional speaker name; expert answers carry [`EXPERT_NAME`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            name: None,
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: "human".to_string(),
            content: content.into(),
            name: None,
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: "ai".to_string(),
            content: content.into(),
            name: None,
        }
    }

    pub fn ai_named(content: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: "ai".to_string(),
            content: content.into(),
            name: Some(name.into()),
        }
    }

    /// Whether this message was spoken by the named speaker.
    pub fn is_from(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

/// Render a dialogue as a flat transcript, one speaker-prefixed line block
/// per message.
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| {
            let speaker = message.name.clone().unwrap_or_else(|| match message.role.as_str() {
                "human" => "Human".to_string(),
                "ai" => "AI".to_string(),
                "system" => "System".to_string(),
                other => other.to_string(),
            });
            format!("{}: {}", speaker, message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merge policies for the outer report record.
///
/// `sections` is the fan-in field: each interview branch appends exactly
/// one entry. Everything else is last-write-wins, including `analysts`,
/// which persona creation regenerates wholesale.
pub fn report_state_schema() -> StateSchema {
    StateSchema::new()
        .with_field("topic", Box::new(OverwriteReducer))
        .with_field("max_analysts", Box::new(OverwriteReducer))
        .with_field("human_feedback", Box::new(OverwriteReducer))
        .with_field("analysts", Box::new(OverwriteReducer))
        .with_field("sections", Box::new(AppendReducer))
        .with_field("introduction", Box::new(OverwriteReducer))
        .with_field("body", Box::new(OverwriteReducer))
        .with_field("conclusion", Box::new(OverwriteReducer))
        .with_field("final_report", Box::new(OverwriteReducer))
}

/// Merge policies for one interview branch's record.
pub fn interview_state_schema() -> StateSchema {
    StateSchema::new()
        .with_field("analyst", Box::new(OverwriteReducer))
        .with_field("messages", Box::new(AppendReducer))
        .with_field("max_num_turns", Box::new(OverwriteReducer))
        .with_field("context", Box::new(AppendReducer))
        .with_field("interview", Box::new(OverwriteReducer))
        .with_field("sections", Box::new(AppendReducer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyst() -> Analyst {
        Analyst {
            name: "Dr. Vega".to_string(),
            role: "Labor economist".to_string(),
            affiliation: "Institute for Work".to_string(),
            description: "Automation effects on mid-career workers".to_string(),
        }
    }

    #[test]
    fn test_persona_brief() {
        let brief = analyst().persona();
        assert!(brief.starts_with("Name: Dr. Vega\n"));
        assert!(brief.contains("Role: Labor economist\n"));
        assert!(brief.ends_with("Description: Automation effects on mid-career workers\n"));
    }

    #[test]
    fn test_chat_message_serialization_skips_empty_name() {
        let plain = serde_json::to_value(ChatMessage::human("hi")).unwrap();
        assert!(plain.get("name").is_none());

        let named = serde_json::to_value(ChatMessage::ai_named("answer", EXPERT_NAME)).unwrap();
        assert_eq!(named["name"], json!("expert"));
    }

    #[test]
    fn test_render_transcript_prefers_speaker_name() {
        let messages = vec![
            ChatMessage::human("So, let's discuss about jobs."),
            ChatMessage::ai("What worries you most?"),
            ChatMessage::ai_named("Mostly displacement.", EXPERT_NAME),
        ];
        let transcript = render_transcript(&messages);
        assert_eq!(
            transcript,
            "Human: So, let's discuss about jobs.\nAI: What worries you most?\nexpert: Mostly displacement."
        );
    }

    #[test]
    fn test_report_schema_appends_sections_only() {
        let schema = report_state_schema();
        let mut state = json!({"sections": ["one"], "analysts": [{"a": 1}]});
        schema
            .apply(&mut state, &json!({"sections": ["two"], "analysts": [{"b": 2}]}))
            .unwrap();

        assert_eq!(state["sections"], json!(["one", "two"]));
        assert_eq!(state["analysts"], json!([{"b": 2}]));
    }

    #[test]
    fn test_perspectives_roundtrip() {
        let perspectives = Perspectives {
            analysts: vec![analyst()],
        };
        let value = serde_json::to_value(&perspectives).unwrap();
        let back: Perspectives = serde_json::from_value(value).unwrap();
        assert_eq!(back, perspectives);
    }
}
