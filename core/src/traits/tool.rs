use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request;

/// One requested tool invocation, extracted from a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub name: String,
    pub params: serde_json::Value,
}

impl ToolUse {
    pub fn new(name: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// The caller supplied a bad tool name or invalid parameters.
    #[error("{0}")]
    InvalidInput(String),

    /// A dependency the tool relies on failed.
    #[error("{0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    pub output: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output,
            error: None,
            request_id: request::current_request_id(),
        }
    }

    pub fn error(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            request_id: request::current_request_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A capability the agent can dispatch to. `parameters` maps each accepted
/// parameter name to a type tag and description; it advertises usage and is
/// not a runtime validator. Runtime validation happens inside `execute`,
/// which must reject a mismatched `tool_use.name` and missing or ill-typed
/// required parameters with `ToolError::InvalidInput`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> serde_json::Value;

    async fn execute(&self, tool_use: &ToolUse) -> Result<serde_json::Value, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
