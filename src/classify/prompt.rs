//! Prompt text and answer parsing for issue classification.

use crate::domain::Issue;
use anyhow::{Context, Result};
use std::path::Path;

/// Built-in definition of the target category, replaceable with `criteria_path`.
pub const DEFAULT_CRITERIA: &str = "\
An agent issue is a problem report about a system built around a large language model agent.
It qualifies when the reported defect lives in agent-specific machinery, for example:
- calling or authenticating against a model provider (keys, endpoints, model names, quotas)
- prompt construction, context management or token limits
- tool or function calling, including argument parsing and tool result handling
- planning, memory, multi-step reasoning loops or multi-agent coordination
- parsing, validating or streaming model output

It does not qualify when the defect is in ordinary infrastructure unrelated to the agent
(packaging, documentation typos, generic UI bugs, CI configuration) or when the report is a
feature request or question rather than a defect.";

/// Load criteria from `path`, or the built-in text when no path is set.
pub fn load_criteria(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read criteria file {}", path.display()))?;
            if text.trim().is_empty() {
                anyhow::bail!("Criteria file {} is empty", path.display());
            }
            Ok(text)
        }
        None => Ok(DEFAULT_CRITERIA.to_string()),
    }
}

pub fn system_prompt(criteria: &str) -> String {
    format!(
        "You are a GitHub issue classification expert. Your task is to determine if a given issue \
         is an \"agent issue\".\n\nAgent Issue Definition and Criteria:\n{}\n\nBased on the above \
         criteria, determine if the given issue is an agent issue.\nAnswer with \"Yes\" or \"No\", \
         followed by a brief explanation (max 50 words).",
        criteria.trim()
    )
}

/// The text handed to the judge for one issue.
pub fn issue_text(issue: &Issue) -> String {
    format!("Issue Title: {}\n\nIssue Description:\n{}", issue.title, issue.body)
}

pub fn user_prompt(issue_text: &str) -> String {
    format!("{issue_text}\n\nIs this an agent issue? Please answer \"Yes\" or \"No\" with a brief explanation.")
}

/// Read the verdict from a free-text answer.
///
/// A leading yes/no decides. Otherwise the answer counts as yes only if it
/// says "yes" somewhere and has no "no" near the start.
pub fn parse_verdict(answer: &str) -> bool {
    let lower = answer.trim().to_lowercase();
    let first_word: String = lower.chars().take_while(|c| c.is_alphabetic()).collect();
    match first_word.as_str() {
        "yes" => true,
        "no" => false,
        _ => {
            let head: String = lower.chars().take(10).collect();
            lower.contains("yes") && !head.contains("no")
        }
    }
}
