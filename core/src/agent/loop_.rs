use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::agent::parser::{Action, parse_action};
use crate::agent::{Conversation, ToolRegistry};
use crate::logger::ConversationLogger;
use crate::request;
use crate::traits::{Message, Provider, ToolResult};

const DEFAULT_MAX_ITERATIONS: usize = 10;

/// The orchestrator: drives provider calls, parses the model's intent,
/// dispatches tool batches, and accumulates the conversation until the model
/// produces a final answer or the iteration budget runs out.
///
/// `run` never fails; every failure mode terminates with an assistant
/// message describing it.
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    system_prompt: Option<String>,
    conversation: Conversation,
    logger: ConversationLogger,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, registry: ToolRegistry) -> Self {
        Self {
            provider,
            registry,
            system_prompt: None,
            conversation: Conversation::new(),
            logger: ConversationLogger::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Read-only view of the accumulated history. Successive `run` calls
    /// extend the same conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn logger(&self) -> &ConversationLogger {
        &self.logger
    }

    pub fn save_conversation(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        self.logger.save(dir)
    }

    pub async fn run_default(&mut self, messages: Vec<Message>) -> Message {
        self.run(messages, DEFAULT_MAX_ITERATIONS).await
    }

    /// Runs the loop until the model produces final text, a failure
    /// terminates the run, or `max_iterations` provider calls have been
    /// made. The returned message always has the assistant role and is the
    /// last entry in the history.
    pub async fn run(&mut self, messages: Vec<Message>, max_iterations: usize) -> Message {
        request::with_new_request_id(self.run_scoped(messages, max_iterations)).await
    }

    async fn run_scoped(&mut self, messages: Vec<Message>, max_iterations: usize) -> Message {
        self.logger
            .set_initial_request_id(request::current_request_id());

        for mut message in messages {
            if message.request_id.is_none() {
                message.request_id = request::current_request_id();
            }
            self.logger.record_message(&message);
            self.conversation.push(message);
        }

        for iteration in 1..=max_iterations {
            debug!(iteration, max_iterations, "agent iteration");

            let raw = match self
                .provider
                .generate_response(&self.request_messages())
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "provider call failed");
                    return self.terminate(format!("Model provider call failed: {}", e));
                }
            };

            let action = match parse_action(&raw) {
                Ok(action) => action,
                Err(e) => {
                    warn!(error = %e, "unparseable model response");
                    return self.terminate(format!("Failed to parse model response: {}", e));
                }
            };

            match action {
                Action::FinalText(text) => {
                    self.logger.record_response("text");
                    return self.append_assistant(text);
                }
                Action::ToolBatch(tool_uses) => {
                    self.logger.record_response("tool_use");
                    let results = self.registry.dispatch_batch(&tool_uses).await;
                    for result in &results {
                        self.logger.record_execution(result);
                    }
                    self.append_assistant(format_tool_results(&results));
                }
            }
        }

        self.terminate(format!(
            "Maximum tool execution iterations ({}) reached without a final response.",
            max_iterations
        ))
    }

    /// Full provider input: the configured system prompt, if any, followed
    /// by the history. The system prompt is configuration and never enters
    /// the append-only history.
    fn request_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(self.conversation.messages().iter().cloned());
        messages
    }

    fn append_assistant(&mut self, content: String) -> Message {
        let message = Message::assistant(content).with_request_id(request::current_request_id());
        self.logger.record_message(&message);
        self.conversation.push(message.clone());
        message
    }

    fn terminate(&mut self, content: String) -> Message {
        self.logger.record_response("error");
        self.append_assistant(content)
    }
}

/// One deterministic history entry for a whole tool batch: tool name plus
/// payload or error, in request order.
fn format_tool_results(results: &[ToolResult]) -> String {
    let mut content = String::from("Tool execution results:");
    for result in results {
        content.push('\n');
        if result.success {
            let payload = serde_json::to_string(&result.output).unwrap_or_default();
            let _ = write!(content, "- {}: {}", result.tool_name, payload);
        } else {
            let _ = write!(
                content,
                "- {}: Error: {}",
                result.tool_name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    content
}
