use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request;
use crate::traits::{Message, ToolResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub tool_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The persisted conversation document: everything an external consumer
/// needs to reconstruct a run, with each entry tagged by the request id that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLog {
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_request_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub tool_executions: Vec<ToolExecutionRecord>,
    pub responses: Vec<ResponseRecord>,
}

/// In-memory recorder for one agent's conversation, persisted on demand as
/// `<dir>/<conversation_id>.json`.
#[derive(Debug)]
pub struct ConversationLogger {
    log: ConversationLog,
}

impl Default for ConversationLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLogger {
    pub fn new() -> Self {
        Self {
            log: ConversationLog {
                conversation_id: Uuid::new_v4().to_string(),
                initial_request_id: None,
                started_at: Utc::now(),
                messages: Vec::new(),
                tool_executions: Vec::new(),
                responses: Vec::new(),
            },
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.log.conversation_id
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Pins the id of the first request in this conversation. Later calls
    /// are no-ops.
    pub fn set_initial_request_id(&mut self, request_id: Option<String>) {
        if self.log.initial_request_id.is_none() {
            self.log.initial_request_id = request_id;
        }
    }

    pub fn record_message(&mut self, message: &Message) {
        self.log.messages.push(message.clone());
    }

    pub fn record_execution(&mut self, result: &ToolResult) {
        self.log.tool_executions.push(ToolExecutionRecord {
            tool_name: result.tool_name.clone(),
            success: result.success,
            request_id: result.request_id.clone(),
        });
    }

    pub fn record_response(&mut self, kind: &str) {
        self.log.responses.push(ResponseRecord {
            r#type: kind.to_string(),
            request_id: request::current_request_id(),
        });
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create conversation directory {}", dir.display()))?;

        let path = dir.join(format!("{}.json", self.log.conversation_id));
        let contents = serde_json::to_string_pretty(&self.log)
            .context("Failed to serialize conversation log")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write conversation log to {}", path.display()))?;

        Ok(path)
    }
}
