//! Context Formatter.
//!
//! Pure string transformation: builds the system prompt and the enhanced
//! user prompt from a task's prior-agent results and relevant files, using
//! the same "labeled section" composition style as a `section`/
//! `numbered_list` helper pair, applied to fixed fields instead of generic
//! template substitution.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

const SUMMARY_TRUNCATE_CHARS: usize = 1000;
const ELLIPSIS: &str = "...";

/// One prior provider's answer, fed into the next call in a `sequential`
/// or dialectical chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousResult {
    pub provider: String,
    pub content: String,
}

/// A file whose content is relevant to the current task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevantFile {
    pub path: String,
    pub content: String,
}

/// Everything the formatter needs to build a call's prompts. Deserializes
/// directly from the CLI's `-c/--context` JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    #[serde(default)]
    pub previous_results: Vec<PreviousResult>,
    #[serde(default)]
    pub relevant_files: Vec<RelevantFile>,
}

impl PromptContext {
    /// Parse a `-c/--context` JSON document: `{"relevant_files": [...],
    /// "previous_results": [...]}`, either key optional.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(PipelineError::Json)
    }
}

const BASE_SYSTEM_PROMPT: &str = "You are a coding assistant. Produce correct, working code for the given task.";

/// Build the system prompt: the base instruction, plus (if any prior
/// results exist) a dashed-delimited summary of each, truncated to 1000
/// characters with an ellipsis marker.
pub fn build_system_prompt(ctx: &PromptContext) -> String {
    if ctx.previous_results.is_empty() {
        return BASE_SYSTEM_PROMPT.to_string();
    }

    let mut parts = vec![BASE_SYSTEM_PROMPT.to_string(), "---".to_string()];
    for prev in &ctx.previous_results {
        parts.push(format!("[{}]: {}", prev.provider, truncate(&prev.content)));
        parts.push("---".to_string());
    }
    parts.pop(); // drop the trailing separator
    parts.join("\n")
}

/// Build the enhanced user prompt: the raw prompt, an optional "relevant
/// files" block, and a previous-responses block.
pub fn build_enhanced_prompt(prompt: &str, ctx: &PromptContext) -> String {
    let mut sections = vec![prompt.to_string()];

    if !ctx.relevant_files.is_empty() {
        let files_block = ctx
            .relevant_files
            .iter()
            .map(|f| format!("File: {}\n```\n{}\n```", f.path, f.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(files_block);
    }

    if !ctx.previous_results.is_empty() {
        let responses_block = ctx
            .previous_results
            .iter()
            .map(|p| format!("{}: {}", p.provider, truncate(&p.content)))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(responses_block);
    }

    sections.join("\n\n")
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= SUMMARY_TRUNCATE_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(SUMMARY_TRUNCATE_CHARS).collect();
        format!("{}{}", truncated, ELLIPSIS)
    }
}
