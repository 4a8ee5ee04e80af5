//! Wire protocol adapters
//!
//! Two backend families encode tool use differently. The content-block
//! protocol puts `tool_use`/`tool_result` blocks inside message content and
//! answers one invocation per round-trip. The function-call protocol attaches
//! `tool_calls` to assistant messages and answers each with a `tool`-role
//! message. Both are normalized to [`crate::Message`] here.

pub mod content_block;
pub mod function_call;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::{ChatResponse, Message, Result, StopReason, ToolDefinition, TranscriptEntry};

/// Output token cap sent with every request
pub const MAX_TOKENS: u32 = 8192;

/// Closing line of both compression instructions
pub const SUMMARY_ONLY: &str = "RETURN ONLY THE SUMMARY, DO NOT RETURN ANY OTHER TEXT.";

/// Executes a tool on behalf of a protocol adapter.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run the named tool. `None` means no tool with that name exists.
    async fn execute(&self, name: &str, input: Value, workspace_root: &Path) -> Option<String>;
}

/// Reply content for a tool name nobody registered
pub fn unknown_tool(name: &str) -> String {
    format!("Error: Unknown tool '{}'", name)
}

/// Final user turn of a summarization request
pub(crate) fn compression_instruction(keep_task_description: bool) -> String {
    let mut lines = vec![
        "Compress the messages above into a single summary that also folds in the chat history so far.",
    ];
    if keep_task_description {
        lines.push("Keep the initial task description intact.");
    }
    lines.extend([
        "Summarize the messages even when the chat history is empty.",
        "Leave out unnecessary or irrelevant details and keep it concise.",
        "Include only the most important points.",
        "Carry specific details such as file paths and identifiers over verbatim.",
        SUMMARY_ONLY,
    ]);
    lines.join("\n")
}

/// Everything needed to encode one chat request
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
    pub system: &'a str,
    pub history: &'a str,
    pub model: &'a str,
}

impl ChatRequest<'_> {
    /// System prompt with the running history appended
    pub fn system_with_history(&self) -> String {
        format!("{}\n\n Chat history so far:\n{}", self.system, self.history)
    }
}

/// Partition of the live buffer decided by a compaction policy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactionPlan {
    /// Prefix to be summarized
    pub to_compress: Vec<Message>,
    /// What the buffer becomes after the summary is taken
    pub retained: Vec<Message>,
}

/// A tool invocation waiting for a result
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    /// Decoded input, or the reason it could not be decoded
    pub input: std::result::Result<Value, String>,
}

/// The wire protocol spoken by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// Anthropic-style content blocks
    ContentBlock,
    /// OpenAI-style function calls
    FunctionCall,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::ContentBlock => "content-block",
            Protocol::FunctionCall => "function-call",
        }
    }

    /// Encode a chat request body
    pub fn format_request(&self, request: &ChatRequest<'_>) -> Result<String> {
        match self {
            Protocol::ContentBlock => content_block::format_request(request),
            Protocol::FunctionCall => function_call::format_request(request),
        }
    }

    /// Decode a chat response into new buffer entries plus stop reason
    pub fn parse_response(&self, response: &Value) -> Result<ChatResponse> {
        match self {
            Protocol::ContentBlock => content_block::parse_response(response),
            Protocol::FunctionCall => function_call::parse_response(response),
        }
    }

    /// Whether the stop reason asks for tool execution
    pub fn needs_tool_processing(&self, stop_reason: Option<&StopReason>) -> bool {
        let expected = match self {
            Protocol::ContentBlock => content_block::TOOL_USE,
            Protocol::FunctionCall => function_call::TOOL_CALLS,
        };
        stop_reason.is_some_and(|r| r.as_str() == expected)
    }

    /// Tool invocations of the last message that this protocol answers.
    ///
    /// `None` when the last message is not an assistant message carrying any.
    pub fn pending_tool_calls(&self, messages: &[Message]) -> Option<Vec<PendingToolCall>> {
        match self {
            Protocol::ContentBlock => content_block::pending_tool_calls(messages),
            Protocol::FunctionCall => function_call::pending_tool_calls(messages),
        }
    }

    /// Execute pending tool calls and build the reply messages.
    ///
    /// Results keep call order. Unknown tools and undecodable arguments become
    /// textual error replies so every invocation is answered.
    pub async fn dispatch_tools(
        &self,
        messages: &[Message],
        tools: &dyn ToolExecutor,
        workspace_root: &Path,
        log: &mut (dyn FnMut(TranscriptEntry) + Send),
    ) -> Option<Vec<Message>> {
        let calls = self.pending_tool_calls(messages)?;
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let content = match call.input {
                Ok(input) => {
                    // Content-block tool uses were already shown with the response
                    if *self == Protocol::FunctionCall {
                        log(TranscriptEntry::ToolUse {
                            name: call.name.clone(),
                            input: input.clone(),
                        });
                    }
                    tracing::debug!(tool = %call.name, id = %call.id, "dispatching tool");
                    tools
                        .execute(&call.name, input, workspace_root)
                        .await
                        .unwrap_or_else(|| unknown_tool(&call.name))
                }
                Err(e) => {
                    tracing::warn!(tool = %call.name, "undecodable tool arguments: {}", e);
                    format!("Error: Invalid arguments for tool '{}': {}", call.name, e)
                }
            };

            log(TranscriptEntry::ToolResult {
                name: call.name,
                content: content.clone(),
            });
            results.push((call.id, content));
        }

        Some(match self {
            Protocol::ContentBlock => content_block::tool_replies(results),
            Protocol::FunctionCall => function_call::tool_replies(results),
        })
    }

    /// Render messages for display
    pub fn transcript(&self, messages: &[Message]) -> Vec<TranscriptEntry> {
        match self {
            Protocol::ContentBlock => content_block::transcript(messages),
            Protocol::FunctionCall => function_call::transcript(messages),
        }
    }

    /// Decide which part of the buffer to summarize
    pub fn plan_compression(&self, messages: &[Message]) -> CompactionPlan {
        match self {
            Protocol::ContentBlock => content_block::plan_compression(messages),
            Protocol::FunctionCall => function_call::plan_compression(messages),
        }
    }

    /// Encode the summarization request
    pub fn format_compression_request(
        &self,
        to_compress: &[Message],
        history: &str,
        model: &str,
    ) -> Result<String> {
        match self {
            Protocol::ContentBlock => {
                content_block::format_compression_request(to_compress, history, model)
            }
            Protocol::FunctionCall => {
                function_call::format_compression_request(to_compress, history, model)
            }
        }
    }

    /// Decode the summarization response into the new history.
    ///
    /// `messages` is the full buffer as it was before compression.
    pub fn parse_compression_response(&self, messages: &[Message], response: &Value) -> Result<String> {
        match self {
            Protocol::ContentBlock => content_block::parse_compression_response(response),
            Protocol::FunctionCall => function_call::parse_compression_response(messages, response),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
