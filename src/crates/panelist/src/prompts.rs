//! System prompt builders for the pipeline stages.
//!
//! Each builder renders one stage's instructions with the state it needs.
//! The exact wording is tuning material, not contract; the pipeline only
//! depends on two anchors: the termination phrase the analyst prompt asks
//! for, and the `## Insights` / `## Sources` headers the report writer is
//! told to emit, which finalization parses back out.

use crate::schema::TERMINATION_PHRASE;

/// Instructions for generating the analyst panel as structured output.
pub fn create_analysts(topic: &str, human_feedback: &str, max_analysts: i64) -> String {
    format!(
        "You are tasked with creating a set of analyst personas.\n\n\
         1. Review the research topic:\n{topic}\n\n\
         2. Examine any editorial feedback provided to guide creation of the analysts:\n{human_feedback}\n\n\
         3. Determine the {max_analysts} most interesting themes in the topic and the feedback.\n\n\
         4. Assign one analyst persona to each theme, with a name, role, affiliation, and a \
         description of their focus, concerns, and motives."
    )
}

/// Instructions for the analyst asking interview questions.
pub fn ask_questions(goals: &str) -> String {
    format!(
        "You are an analyst interviewing an expert about a specific topic. \
         Pursue insights that are interesting (surprising, non-obvious) and specific \
         (grounded in the expert's examples).\n\n\
         Here is your topic of focus and set of goals: {goals}\n\n\
         Introduce yourself with a name fitting your persona, then ask your question. \
         Keep drilling down to refine your understanding. \
         When you are satisfied, complete the interview with: \"{TERMINATION_PHRASE}\"\n\n\
         Stay in character throughout. Refer to the expert simply as expert."
    )
}

/// Instructions for turning the dialogue into a web-search query.
pub fn generate_search_query() -> String {
    "You will be given a conversation between an analyst and an expert. \
     Analyze the full conversation, paying particular attention to the final \
     question posed by the analyst, and convert that question into a \
     well-structured web search query."
        .to_string()
}

/// Instructions for the expert answering from retrieved context.
pub fn generate_answer(goals: &str, context: &str) -> String {
    format!(
        "You are an expert being interviewed by an analyst.\n\n\
         Analyst area of focus: {goals}\n\n\
         Answer the question posed by the interviewer using only this context:\n{context}\n\n\
         Do not introduce information beyond the context. Each document opens with a tag \
         naming its source; cite sources next to relevant statements as [1], [2], ... and \
         list them in order at the bottom of your answer."
    )
}

/// Instructions for writing one report section from an interview.
pub fn write_section(focus: &str) -> String {
    format!(
        "You are an expert technical writer. Create a short, easily digestible report \
         section from the source documents you are given (each document names its source \
         in its opening tag).\n\n\
         Structure, in markdown: a title (## header) engaging for this focus area: {focus}; \
         a Summary (### header) of roughly 800 words emphasizing what is novel or \
         surprising, citing sources as [1], [2], ...; and a Sources (### header) list of \
         the cited links with no duplicates. Do not name the interviewer or the expert, \
         and include no preamble before the title."
    )
}

/// Instructions for consolidating all memos into the report body.
pub fn write_report(topic: &str) -> String {
    format!(
        "You are a technical writer creating a report on this overall topic:\n\n{topic}\n\n\
         You will be given a collection of memos written by analysts after interviewing \
         experts on sub-topics. Consolidate them into a crisp single narrative tying \
         together their central ideas.\n\n\
         Format in markdown with no preamble and no sub-headings. Start with a single \
         title header: ## Insights. Preserve any bracketed citations from the memos, and \
         end with a consolidated, de-duplicated source list under a ## Sources header."
    )
}

/// Instructions for writing the introduction or conclusion; the paired
/// human message says which one.
pub fn intro_or_conclusion(topic: &str, formatted_sections: &str) -> String {
    format!(
        "You are a technical writer finishing a report on {topic}. You will be given all \
         of the report's sections and told whether to write the introduction or the \
         conclusion.\n\n\
         Target around 100 words in markdown with no preamble. For an introduction, \
         create a compelling title with a # header and use ## Introduction as the section \
         header. For a conclusion, use ## Conclusion as the section header.\n\n\
         Here are the sections to reflect on:\n{formatted_sections}"
    )
}
