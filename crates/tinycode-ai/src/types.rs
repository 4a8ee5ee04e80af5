//! Core message model shared by both wire protocols

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One typed fragment of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text { text: String },
    /// Tool invocation requested by the assistant
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Result of a tool invocation, keyed by the invocation id
    ToolResult { tool_use_id: String, content: String },
}

impl ContentBlock {
    /// Create a text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool_use block
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool_result block
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
        }
    }

    /// Get text if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Message content: either plain text or an ordered block sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Combined text of the content, ignoring non-text blocks
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| b.as_text())
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Plain text, or blocks that are all text
    pub fn is_text_only(&self) -> bool {
        match self {
            Self::Text(_) => true,
            Self::Blocks(blocks) => blocks.iter().all(|b| matches!(b, ContentBlock::Text { .. })),
        }
    }

    /// Get the block sequence, if any
    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            Self::Text(_) => &[],
            Self::Blocks(blocks) => blocks,
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::Blocks(blocks)
    }
}

/// A function call carried by an assistant message (function-call protocol)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

/// Function name plus JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as a JSON string, exactly as the backend sent them
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    /// Create a function call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Conversation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// User input, or tool results in the content-block protocol
    User { content: MessageContent },
    /// Assistant response
    Assistant {
        #[serde(default)]
        content: Option<MessageContent>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// System instruction
    System { content: String },
    /// Tool result in the function-call protocol
    Tool { tool_call_id: String, content: String },
}

impl Message {
    /// Create a user message with plain text
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create a user message with blocks
    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::User {
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Create an assistant message with plain text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(MessageContent::Text(text.into())),
            tool_calls: vec![],
        }
    }

    /// Create an assistant message with blocks
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::Assistant {
            content: Some(MessageContent::Blocks(blocks)),
            tool_calls: vec![],
        }
    }

    /// Create an assistant message that only carries function calls
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: None,
            tool_calls,
        }
    }

    /// Create a tool-role result message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Structured content, if the message has any
    pub fn content(&self) -> Option<&MessageContent> {
        match self {
            Self::User { content } => Some(content),
            Self::Assistant { content, .. } => content.as_ref(),
            Self::System { .. } | Self::Tool { .. } => None,
        }
    }

    /// Combined text content
    pub fn text(&self) -> String {
        match self {
            Self::System { content } | Self::Tool { content, .. } => content.clone(),
            _ => self.content().map(|c| c.text()).unwrap_or_default(),
        }
    }

    /// Plain-text user message content
    pub fn user_text(&self) -> Option<&str> {
        match self {
            Self::User {
                content: MessageContent::Text(text),
            } => Some(text),
            _ => None,
        }
    }

    /// Content is plain text or consists solely of text blocks
    pub fn is_text_only(&self) -> bool {
        self.content().is_some_and(|c| c.is_text_only())
    }

    /// Content contains at least one tool_result block
    pub fn is_tool_result_bearing(&self) -> bool {
        self.content().is_some_and(|c| {
            c.blocks()
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
        })
    }

    /// tool_use blocks as (id, name, input)
    pub fn tool_use_blocks(&self) -> Vec<(&str, &str, &Value)> {
        match self.content() {
            Some(content) => content
                .blocks()
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.as_str(), name.as_str(), input))
                    }
                    _ => None,
                })
                .collect(),
            None => vec![],
        }
    }

    /// Function calls of an assistant message
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Backend-supplied reason a generation turn ended
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopReason(String);

impl StopReason {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StopReason {
    fn from(reason: &str) -> Self {
        Self(reason.to_string())
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tool definition sent to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (used in API calls)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
    /// Backend-native tool type (e.g. `bash_20250124`), content-block protocol only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_type: Option<String>,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            native_type: None,
        }
    }

    /// Mark the tool as backend-native
    pub fn with_native_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = Some(native_type.into());
        self
    }
}

/// Result of one backend round-trip
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub messages: Vec<Message>,
    pub stop_reason: Option<StopReason>,
}

/// A rendered line of conversation for display
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    User(String),
    Assistant(String),
    ToolUse { name: String, input: Value },
    ToolResult { name: String, content: String },
}

/// A tool result that does not answer the invocation immediately before it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingViolation {
    /// Index of the offending message
    pub index: usize,
    /// Correlation id it carried
    pub id: String,
}

impl fmt::Display for PairingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "message {} answers tool invocation '{}' which is not pending",
            self.index, self.id
        )
    }
}

/// Check that every tool result references an unmatched invocation of the
/// assistant message immediately preceding it.
pub fn check_tool_pairing(messages: &[Message]) -> Result<(), PairingViolation> {
    let mut pending: Vec<String> = Vec::new();

    for (index, message) in messages.iter().enumerate() {
        match message {
            Message::Assistant { .. } => {
                pending = message
                    .tool_use_blocks()
                    .into_iter()
                    .map(|(id, _, _)| id.to_string())
                    .chain(message.tool_calls().iter().map(|c| c.id.clone()))
                    .collect();
            }
            Message::Tool { tool_call_id, .. } => {
                take_pending(&mut pending, tool_call_id, index)?;
            }
            Message::User { content } => {
                let mut answered = false;
                for block in content.blocks() {
                    if let ContentBlock::ToolResult { tool_use_id, .. } = block {
                        take_pending(&mut pending, tool_use_id, index)?;
                        answered = true;
                    }
                }
                if !answered {
                    pending.clear();
                }
            }
            Message::System { .. } => {}
        }
    }

    Ok(())
}

fn take_pending(pending: &mut Vec<String>, id: &str, index: usize) -> Result<(), PairingViolation> {
    match pending.iter().position(|p| p == id) {
        Some(pos) => {
            pending.remove(pos);
            Ok(())
        }
        None => Err(PairingViolation {
            index,
            id: id.to_string(),
        }),
    }
}
