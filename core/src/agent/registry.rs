use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{Tool, ToolResult, ToolSpec, ToolUse};

/// Immutable name-keyed table of tool capabilities, built once at startup.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> anyhow::Result<Self> {
        let mut table = HashMap::new();
        let mut order = Vec::with_capacity(tools.len());

        for tool in tools {
            let name = tool.name().to_string();
            if table.insert(name.clone(), tool).is_some() {
                anyhow::bail!("duplicate tool name '{}'", name);
            }
            order.push(name);
        }

        Ok(Self {
            tools: table,
            order,
        })
    }

    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool specs in registration order, for advertising usage to the model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    /// Executes one tool use inside a failure boundary. Never fails: an
    /// unknown name or a tool error becomes an unsuccessful [`ToolResult`].
    pub async fn dispatch(&self, tool_use: &ToolUse) -> ToolResult {
        let Some(tool) = self.tools.get(&tool_use.name) else {
            return ToolResult::error(
                &tool_use.name,
                format!("Tool '{}' not found", tool_use.name),
            );
        };

        match tool.execute(tool_use).await {
            Ok(output) => ToolResult::success(&tool_use.name, output),
            Err(e) => {
                tracing::warn!(tool = %tool_use.name, error = %e, "Tool execution failed");
                ToolResult::error(&tool_use.name, e.to_string())
            }
        }
    }

    /// Dispatches every tool use in the batch, in request order. One tool's
    /// failure does not prevent the others from being attempted, and the
    /// returned results keep the request order.
    pub async fn dispatch_batch(&self, tool_uses: &[ToolUse]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(tool_uses.len());
        for tool_use in tool_uses {
            results.push(self.dispatch(tool_use).await);
        }
        results
    }
}
