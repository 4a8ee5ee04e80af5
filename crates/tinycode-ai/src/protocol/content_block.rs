//! Content-block protocol (Anthropic messages format)

use serde::Serialize;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::collections::HashMap;

use super::{
    ChatRequest, CompactionPlan, MAX_TOKENS, PendingToolCall, compression_instruction,
};
use crate::{
    ChatResponse, ContentBlock, Error, Message, MessageContent, Result, StopReason, ToolDefinition,
    TranscriptEntry,
};

/// Stop reason asking for tool execution
pub const TOOL_USE: &str = "tool_use";

#[derive(Serialize)]
struct RequestBody<'a> {
    anthropic_version: &'a str,
    system: String,
    max_tokens: u32,
    messages: Cow<'a, [Message]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

fn tool_schema(tool: &ToolDefinition) -> Value {
    match &tool.native_type {
        Some(kind) => json!({ "name": tool.name, "type": kind }),
        None => json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.parameters,
        }),
    }
}

pub fn format_request(request: &ChatRequest<'_>) -> Result<String> {
    let body = RequestBody {
        anthropic_version: request.model,
        system: request.system_with_history(),
        max_tokens: MAX_TOKENS,
        messages: Cow::Borrowed(request.messages),
        tools: request.tools.iter().map(tool_schema).collect(),
    };
    Ok(serde_json::to_string(&body)?)
}

/// The whole response becomes one assistant message holding its blocks.
pub fn parse_response(response: &Value) -> Result<ChatResponse> {
    let content = response
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::UnexpectedResponse(format!("no content array in {}", response)))?;

    let blocks = content
        .iter()
        .filter_map(|raw| match serde_json::from_value::<ContentBlock>(raw.clone()) {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::debug!("skipping unsupported content block: {}", e);
                None
            }
        })
        .collect();

    let stop_reason = response
        .get("stop_reason")
        .and_then(Value::as_str)
        .map(StopReason::from);

    Ok(ChatResponse {
        messages: vec![Message::assistant_blocks(blocks)],
        stop_reason,
    })
}

/// Only the first tool_use block of the last assistant message is answered.
pub fn pending_tool_calls(messages: &[Message]) -> Option<Vec<PendingToolCall>> {
    let last = messages.last()?;
    if !matches!(last, Message::Assistant { .. }) {
        return None;
    }
    let (id, name, input) = last.tool_use_blocks().into_iter().next()?;
    Some(vec![PendingToolCall {
        id: id.to_string(),
        name: name.to_string(),
        input: Ok(input.clone()),
    }])
}

/// One user message carrying a tool_result block per answered invocation
pub fn tool_replies(results: Vec<(String, String)>) -> Vec<Message> {
    vec![Message::user_blocks(
        results
            .into_iter()
            .map(|(id, content)| ContentBlock::tool_result(id, content))
            .collect(),
    )]
}

pub fn transcript(messages: &[Message]) -> Vec<TranscriptEntry> {
    let mut tool_names: HashMap<&str, &str> = HashMap::new();
    let mut entries = Vec::new();

    for message in messages {
        match message {
            Message::User {
                content: MessageContent::Text(text),
            } => entries.push(TranscriptEntry::User(text.clone())),
            Message::User {
                content: MessageContent::Blocks(blocks),
            } => {
                for block in blocks {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } = block
                    {
                        if let Some(name) = tool_names.get(tool_use_id.as_str()) {
                            entries.push(TranscriptEntry::ToolResult {
                                name: name.to_string(),
                                content: content.clone(),
                            });
                        }
                    }
                }
            }
            Message::Assistant {
                content: Some(MessageContent::Text(text)),
                ..
            } => entries.push(TranscriptEntry::Assistant(text.clone())),
            Message::Assistant {
                content: Some(MessageContent::Blocks(blocks)),
                ..
            } => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => {
                            entries.push(TranscriptEntry::Assistant(text.clone()))
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_names.insert(id, name);
                            entries.push(TranscriptEntry::ToolUse {
                                name: name.clone(),
                                input: input.clone(),
                            });
                        }
                        ContentBlock::ToolResult { .. } => {}
                    }
                }
            }
            _ => {}
        }
    }

    entries
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    /// Assistant message made only of text
    AssistantText,
    /// User message carrying a tool result
    ToolResult,
}

/// Nearest boundary at or before the midpoint of the buffer, scanning backward.
fn find_nearest_index(messages: &[Message], boundary: Boundary) -> Option<usize> {
    let half = messages.len() / 2;
    (0..=half).rev().find(|&i| {
        messages.get(i).is_some_and(|m| match boundary {
            Boundary::AssistantText => matches!(m, Message::Assistant { .. }) && m.is_text_only(),
            Boundary::ToolResult => matches!(m, Message::User { .. }) && m.is_tool_result_bearing(),
        })
    })
}

/// Summarize up to and including the later of the two nearest boundaries.
///
/// Cutting only after a finished assistant turn or an answered tool call
/// keeps every retained tool_result next to its tool_use.
pub fn plan_compression(messages: &[Message]) -> CompactionPlan {
    let tool_result = find_nearest_index(messages, Boundary::ToolResult);
    let text = find_nearest_index(messages, Boundary::AssistantText);

    match tool_result.max(text) {
        None => CompactionPlan {
            to_compress: vec![],
            retained: messages.to_vec(),
        },
        Some(index) => {
            let (head, tail) = messages.split_at(index + 1);
            CompactionPlan {
                to_compress: head.to_vec(),
                retained: tail.to_vec(),
            }
        }
    }
}

#[derive(Serialize)]
struct CompressionBody<'a> {
    anthropic_version: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

pub fn format_compression_request(to_compress: &[Message], history: &str, model: &str) -> Result<String> {
    let mut messages = to_compress.to_vec();
    messages.push(Message::user(compression_instruction(false)));

    let body = CompressionBody {
        anthropic_version: model,
        max_tokens: MAX_TOKENS,
        system: format!("Chat history so far:\n{}", history),
        messages,
    };
    Ok(serde_json::to_string(&body)?)
}

/// The summary is the text of the response blocks.
pub fn parse_compression_response(response: &Value) -> Result<String> {
    match response.get("content") {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Array(blocks)) => Ok(blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")),
        _ => Err(Error::UnexpectedResponse(format!(
            "no summary content in {}",
            response
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_tool_pairing;
    use crate::protocol::SUMMARY_ONLY;

    fn tool_use(id: &str) -> Message {
        Message::assistant_blocks(vec![ContentBlock::tool_use(id, "bash", json!({"command": "ls"}))])
    }

    fn tool_result(id: &str) -> Message {
        Message::user_blocks(vec![ContentBlock::tool_result(id, "a.txt")])
    }

    #[test]
    fn test_format_request_shape() {
        let messages = vec![Message::user("list files")];
        let tools = vec![
            ToolDefinition::new("bash", "Run a command", json!({"type": "object"}))
                .with_native_type("bash_20250124"),
            ToolDefinition::new("todo", "Track todos", json!({"type": "object"})),
        ];
        let body = format_request(&ChatRequest {
            messages: &messages,
            tools: &tools,
            system: "SYS",
            history: "H",
            model: "bedrock-2023-05-31",
        })
        .unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(body["system"], "SYS\n\n Chat history so far:\nH");
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(body["messages"], json!([{"role": "user", "content": "list files"}]));
        assert_eq!(body["tools"][0], json!({"name": "bash", "type": "bash_20250124"}));
        assert_eq!(body["tools"][1]["input_schema"], json!({"type": "object"}));
        assert_eq!(body["tools"][1]["description"], "Track todos");
    }

    #[test]
    fn test_format_request_without_tools_omits_field() {
        let body = format_request(&ChatRequest {
            messages: &[],
            tools: &[],
            system: "",
            history: "",
            model: "m",
        })
        .unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_response_single_assistant_message() {
        let response = json!({
            "content": [
                {"type": "text", "text": "Listing."},
                {"type": "tool_use", "id": "t1", "name": "bash", "input": {"command": "ls"}}
            ],
            "stop_reason": "tool_use"
        });
        let parsed = parse_response(&response).unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.stop_reason, Some(StopReason::from("tool_use")));
        assert_eq!(parsed.messages[0].tool_use_blocks()[0].0, "t1");
    }

    #[test]
    fn test_parse_response_skips_unknown_blocks() {
        let response = json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "done"}
            ],
            "stop_reason": "end_turn"
        });
        let parsed = parse_response(&response).unwrap();
        assert_eq!(parsed.messages[0], Message::assistant_blocks(vec![ContentBlock::text("done")]));
    }

    #[test]
    fn test_parse_response_without_content_fails() {
        let err = parse_response(&json!({"error": "boom"})).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[test]
    fn test_formatted_round_trip_keeps_pairing() {
        let mut messages = vec![Message::user("list files")];
        let response = json!({
            "content": [{"type": "tool_use", "id": "t1", "name": "bash", "input": {"command": "ls"}}],
            "stop_reason": "tool_use"
        });
        messages.extend(parse_response(&response).unwrap().messages);
        messages.extend(tool_replies(vec![("t1".into(), "a.txt".into())]));
        assert_eq!(check_tool_pairing(&messages), Ok(()));
        assert!(format_request(&ChatRequest {
            messages: &messages,
            tools: &[],
            system: "",
            history: "",
            model: "m",
        })
        .is_ok());
    }

    #[test]
    fn test_pending_tool_calls_requires_assistant_tool_use() {
        assert!(pending_tool_calls(&[Message::user("hi")]).is_none());
        assert!(pending_tool_calls(&[Message::assistant("hello")]).is_none());
        let calls = pending_tool_calls(&[tool_use("t1")]).unwrap();
        assert_eq!(calls[0].name, "bash");
        assert_eq!(calls[0].input, Ok(json!({"command": "ls"})));
    }

    #[test]
    fn test_transcript() {
        let messages = vec![
            Message::user("list files"),
            Message::assistant_blocks(vec![
                ContentBlock::text("Sure."),
                ContentBlock::tool_use("t1", "bash", json!({"command": "ls"})),
            ]),
            tool_result("t1"),
            tool_result("orphan"),
            Message::assistant("Found a.txt"),
        ];
        assert_eq!(
            transcript(&messages),
            vec![
                TranscriptEntry::User("list files".into()),
                TranscriptEntry::Assistant("Sure.".into()),
                TranscriptEntry::ToolUse {
                    name: "bash".into(),
                    input: json!({"command": "ls"})
                },
                TranscriptEntry::ToolResult {
                    name: "bash".into(),
                    content: "a.txt".into()
                },
                TranscriptEntry::Assistant("Found a.txt".into()),
            ]
        );
    }

    #[test]
    fn test_plan_compression_without_boundary_is_noop() {
        // Midpoint is index 1; the tool result at index 2 lies past it
        let messages = vec![Message::user("go"), tool_use("t1"), tool_result("t1")];
        let plan = plan_compression(&messages);
        assert!(plan.to_compress.is_empty());
        assert_eq!(plan.retained, messages);
    }

    #[test]
    fn test_plan_compression_empty_buffer() {
        let plan = plan_compression(&[]);
        assert!(plan.to_compress.is_empty());
        assert!(plan.retained.is_empty());
    }

    #[test]
    fn test_plan_compression_cuts_after_assistant_text() {
        let messages = vec![
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("list files"),
            tool_use("t1"),
            tool_result("t1"),
        ];
        let plan = plan_compression(&messages);
        assert_eq!(plan.to_compress, messages[..2].to_vec());
        assert_eq!(plan.retained, messages[2..].to_vec());
    }

    #[test]
    fn test_plan_compression_prefers_later_boundary() {
        let messages = vec![
            Message::user("go"),
            tool_use("t1"),
            tool_result("t1"),
            tool_use("t2"),
            tool_result("t2"),
            Message::assistant("done"),
        ];
        let plan = plan_compression(&messages);
        assert_eq!(plan.to_compress.len(), 3);
        assert_eq!(plan.retained[0], tool_use("t2"));
        assert_eq!(check_tool_pairing(&plan.retained), Ok(()));
    }

    #[test]
    fn test_compression_request_shape() {
        let body = format_compression_request(&[Message::user("hi")], "old summary", "m").unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["system"], "Chat history so far:\nold summary");
        assert_eq!(body["anthropic_version"], "m");
        assert!(body.get("tools").is_none());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["role"], "user");
        assert!(messages[1]["content"].as_str().unwrap().ends_with(SUMMARY_ONLY));
        assert!(!messages[1]["content"].as_str().unwrap().contains("task description"));
    }

    #[test]
    fn test_parse_compression_response_joins_text() {
        let response = json!({
            "content": [{"type": "text", "text": "Part one."}, {"type": "text", "text": "Part two."}]
        });
        assert_eq!(parse_compression_response(&response).unwrap(), "Part one.\nPart two.");
        assert!(parse_compression_response(&json!({})).is_err());
    }
}
