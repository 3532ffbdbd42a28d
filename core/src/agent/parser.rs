use serde::Deserialize;
use thiserror::Error;

use crate::traits::ToolUse;

/// The parsed interpretation of one raw model response: either a batch of
/// tool invocations or the final answer text. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ToolBatch(Vec<ToolUse>),
    FinalText(String),
}

#[derive(Debug, Error)]
#[error("model response is not a recognizable action: {0}")]
pub struct ParseError(#[from] serde_json::Error);

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireResponse {
    ToolUse { tool_uses: Vec<ToolUse> },
    Text { text: String },
}

/// Parses a raw model response into an [`Action`]. The response may be
/// wrapped in a fenced code block (language-tagged or bare); the fence is
/// stripped before the remainder is parsed as a tagged JSON object.
pub fn parse_action(raw: &str) -> Result<Action, ParseError> {
    let wire: WireResponse = serde_json::from_str(strip_code_fence(raw))?;
    Ok(match wire {
        WireResponse::ToolUse { tool_uses } => Action::ToolBatch(tool_uses),
        WireResponse::Text { text } => Action::FinalText(text),
    })
}

pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);

    // Drop the language tag on the opening fence line, if any.
    match inner.split_once('\n') {
        Some((first_line, rest)) if !first_line.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}
