use serde_json::Value;

use crate::traits::{ToolError, ToolUse};

pub mod detect;
pub mod draw;

pub use detect::{BoundingBox, DetectBoundingBoxTool, DetectOutput};
pub use draw::DrawBoundingBoxTool;

pub(crate) fn check_tool_name(expected: &str, tool_use: &ToolUse) -> Result<(), ToolError> {
    if tool_use.name != expected {
        return Err(ToolError::InvalidInput(format!(
            "Tool name mismatch: expected {}, got {}",
            expected, tool_use.name
        )));
    }
    Ok(())
}

pub(crate) fn require_param<'a>(params: &'a Value, key: &str) -> Result<&'a Value, ToolError> {
    match params.get(key) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(ToolError::InvalidInput(format!(
            "{} parameter is required",
            key
        ))),
    }
}

pub(crate) fn require_string_param(params: &Value, key: &str) -> Result<String, ToolError> {
    require_param(params, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidInput(format!("{} parameter must be a string", key)))
}

pub(crate) fn optional_string_param(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

pub(crate) fn optional_u32_param(params: &Value, key: &str, default: u32) -> u32 {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .unwrap_or(default)
}
