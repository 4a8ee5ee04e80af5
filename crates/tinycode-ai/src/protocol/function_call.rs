//! Function-call protocol (OpenAI chat completions format)

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

use super::{ChatRequest, CompactionPlan, MAX_TOKENS, PendingToolCall, compression_instruction};
use crate::{
    ChatResponse, Error, Message, MessageContent, Result, StopReason, ToolCall, ToolDefinition,
    TranscriptEntry,
};

/// Stop reason asking for tool execution
pub const TOOL_CALLS: &str = "tool_calls";

/// Buffer contents after a compaction
pub const COMPRESSED_ACK: &str = "Chat history compressed. Please check the history and continue with your task. No need to say \"Understood\".";

/// How many trailing messages are rendered verbatim into the new history
const CONTEXT_TAIL: usize = 5;

#[derive(Serialize)]
struct RequestBody<'a> {
    messages: &'a [Message],
    system: String,
    max_tokens: u32,
    model: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

fn tool_schema(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

pub fn format_request(request: &ChatRequest<'_>) -> Result<String> {
    let body = RequestBody {
        messages: request.messages,
        system: request.system_with_history(),
        max_tokens: MAX_TOKENS,
        model: request.model,
        tools: request.tools.iter().map(tool_schema).collect(),
    };
    Ok(serde_json::to_string(&body)?)
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

fn decode_completion(response: &Value) -> Result<CompletionResponse> {
    serde_json::from_value(response.clone())
        .map_err(|e| Error::UnexpectedResponse(format!("malformed completion ({}): {}", e, response)))
}

/// Each choice yields a text entry and, separately, a tool-call entry.
///
/// Some backends report the text and the calls as two choices with
/// different finish reasons, so any choice carrying calls makes the
/// stop reason `tool_calls`.
pub fn parse_response(response: &Value) -> Result<ChatResponse> {
    let completion = decode_completion(response)?;
    let mut messages = Vec::new();
    let mut wants_tools = false;

    for choice in &completion.choices {
        if let Some(text) = choice.message.content.as_deref().filter(|t| !t.is_empty()) {
            messages.push(Message::assistant(text));
        }
        if let Some(calls) = choice.message.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            messages.push(Message::assistant_tool_calls(calls.clone()));
            wants_tools = true;
        }
        wants_tools |= choice.finish_reason.as_deref() == Some(TOOL_CALLS);
    }

    let stop_reason = if wants_tools {
        Some(StopReason::from(TOOL_CALLS))
    } else {
        completion
            .choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .map(StopReason::from)
    };

    Ok(ChatResponse {
        messages,
        stop_reason,
    })
}

fn decode_arguments(raw: &str) -> std::result::Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|e| e.to_string())
}

/// Every function call of the last assistant message, in order.
pub fn pending_tool_calls(messages: &[Message]) -> Option<Vec<PendingToolCall>> {
    let calls = messages.last()?.tool_calls();
    if calls.is_empty() {
        return None;
    }
    Some(
        calls
            .iter()
            .map(|call| PendingToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: decode_arguments(&call.function.arguments),
            })
            .collect(),
    )
}

pub fn tool_replies(results: Vec<(String, String)>) -> Vec<Message> {
    results
        .into_iter()
        .map(|(id, content)| Message::tool(id, content))
        .collect()
}

/// Tool messages render as a use/result pair once their call is known.
pub fn transcript(messages: &[Message]) -> Vec<TranscriptEntry> {
    let mut calls: HashMap<&str, &ToolCall> = HashMap::new();
    let mut entries = Vec::new();

    for message in messages {
        match message {
            Message::User {
                content: MessageContent::Text(text),
            } => entries.push(TranscriptEntry::User(text.clone())),
            Message::Tool {
                tool_call_id,
                content,
            } => {
                let Some(call) = calls.get(tool_call_id.as_str()) else {
                    continue;
                };
                let name = call.function.name.clone();
                entries.push(TranscriptEntry::ToolUse {
                    name: name.clone(),
                    input: decode_arguments(&call.function.arguments)
                        .unwrap_or_else(|_| Value::String(call.function.arguments.clone())),
                });
                entries.push(TranscriptEntry::ToolResult {
                    name,
                    content: content.clone(),
                });
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                if let Some(text) = content.as_ref().map(|c| c.text()).filter(|t| !t.is_empty()) {
                    entries.push(TranscriptEntry::Assistant(text));
                }
                for call in tool_calls {
                    calls.insert(&call.id, call);
                }
            }
            _ => {}
        }
    }

    entries
}

/// The whole buffer is summarized; only an acknowledgement remains.
pub fn plan_compression(messages: &[Message]) -> CompactionPlan {
    CompactionPlan {
        to_compress: messages.to_vec(),
        retained: vec![Message::user(COMPRESSED_ACK)],
    }
}

#[derive(Serialize)]
struct CompressionBody<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

pub fn format_compression_request(to_compress: &[Message], history: &str, model: &str) -> Result<String> {
    let mut messages = to_compress.to_vec();
    messages.push(Message::user(compression_instruction(true)));

    let body = CompressionBody {
        model,
        max_tokens: MAX_TOKENS,
        system: format!("Chat history so far:\n{}", history),
        messages,
    };
    Ok(serde_json::to_string(&body)?)
}

fn render_entry(entry: &TranscriptEntry) -> String {
    match entry {
        TranscriptEntry::User(text) => format!("User: {}", text),
        TranscriptEntry::Assistant(text) => format!("Assistant: {}", text),
        TranscriptEntry::ToolUse { name, .. } => format!("Tool Use: {}", name),
        TranscriptEntry::ToolResult { name, content } => {
            format!("Tool Result: {} - {}", name, content)
        }
    }
}

/// Summary text followed by a rendering of the last few messages.
pub fn parse_compression_response(messages: &[Message], response: &Value) -> Result<String> {
    let completion = decode_completion(response)?;
    let summary = completion
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .unwrap_or_default();

    let tail = &messages[messages.len().saturating_sub(CONTEXT_TAIL)..];
    let context = transcript(tail)
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n===========\n");

    Ok(format!("{}\n\nLast 5 Messages:\n{}", summary, context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_tool_pairing;
    use crate::protocol::SUMMARY_ONLY;

    fn completion(content: Value, tool_calls: Value, finish: &str) -> Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": content, "tool_calls": tool_calls},
                "finish_reason": finish
            }]
        })
    }

    #[test]
    fn test_format_request_shape() {
        let messages = vec![Message::user("hi")];
        let tools = vec![
            ToolDefinition::new("bash", "Run a command", json!({"type": "object"}))
                .with_native_type("bash_20250124"),
        ];
        let body = format_request(&ChatRequest {
            messages: &messages,
            tools: &tools,
            system: "SYS",
            history: "",
            model: "gpt-4",
        })
        .unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["system"], "SYS\n\n Chat history so far:\n");
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(
            body["tools"][0],
            json!({
                "type": "function",
                "function": {"name": "bash", "description": "Run a command", "parameters": {"type": "object"}}
            })
        );
    }

    #[test]
    fn test_parse_text_then_tool_calls() {
        let response = completion(
            json!("Let me check."),
            json!([{"id": "c1", "type": "function", "function": {"name": "bash", "arguments": "{\"command\":\"ls\"}"}}]),
            "tool_calls",
        );
        let parsed = parse_response(&response).unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.messages[0], Message::assistant("Let me check."));
        assert_eq!(parsed.messages[1].tool_calls()[0].id, "c1");
        assert!(parsed.messages[1].content().is_none());
        assert_eq!(parsed.stop_reason, Some(StopReason::from("tool_calls")));
    }

    #[test]
    fn test_parse_plain_text() {
        let parsed = parse_response(&completion(json!("Done."), Value::Null, "stop")).unwrap();
        assert_eq!(parsed.messages, vec![Message::assistant("Done.")]);
        assert_eq!(parsed.stop_reason, Some(StopReason::from("stop")));
    }

    #[test]
    fn test_parse_split_choices() {
        let response = json!({
            "choices": [
                {"message": {"content": "Checking."}, "finish_reason": "stop"},
                {"message": {"content": null, "tool_calls": [
                    {"id": "c1", "function": {"name": "bash", "arguments": "{}"}}
                ]}, "finish_reason": "tool_calls"}
            ]
        });
        let parsed = parse_response(&response).unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.stop_reason, Some(StopReason::from("tool_calls")));
    }

    #[test]
    fn test_parse_rejects_missing_choices() {
        assert!(matches!(
            parse_response(&json!({"error": {"message": "nope"}})),
            Err(Error::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_pending_tool_calls_decodes_arguments() {
        let messages = vec![Message::assistant_tool_calls(vec![
            ToolCall::new("c1", "bash", r#"{"command":"ls"}"#),
            ToolCall::new("c2", "todo", ""),
            ToolCall::new("c3", "bash", "{broken"),
        ])];
        let calls = pending_tool_calls(&messages).unwrap();
        assert_eq!(calls[0].input, Ok(json!({"command": "ls"})));
        assert_eq!(calls[1].input, Ok(json!({})));
        assert!(calls[2].input.is_err());
        assert!(pending_tool_calls(&[Message::assistant("hi")]).is_none());
    }

    #[test]
    fn test_transcript_pairs_tool_messages_with_calls() {
        let messages = vec![
            Message::user("list"),
            Message::assistant_tool_calls(vec![ToolCall::new("c1", "bash", r#"{"command":"ls"}"#)]),
            Message::tool("c1", "a.txt"),
            Message::tool("unknown", "dropped"),
            Message::assistant("Found a.txt"),
        ];
        assert_eq!(
            transcript(&messages),
            vec![
                TranscriptEntry::User("list".into()),
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
    fn test_plan_compression_replaces_buffer_with_ack() {
        let messages = vec![Message::user("a"), Message::assistant("b")];
        let plan = plan_compression(&messages);
        assert_eq!(plan.to_compress, messages);
        assert_eq!(plan.retained, vec![Message::user(COMPRESSED_ACK)]);
    }

    #[test]
    fn test_compression_request_shape() {
        let body = format_compression_request(&[Message::user("a")], "", "gpt-4o").unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["system"], "Chat history so far:\n");
        let instruction = body["messages"][1]["content"].as_str().unwrap();
        assert!(instruction.contains("Keep the initial task description intact."));
        assert!(instruction.ends_with(SUMMARY_ONLY));
    }

    #[test]
    fn test_parse_compression_response_appends_last_five() {
        let messages = vec![
            Message::user("first, should not appear"),
            Message::user("fix the bug"),
            Message::assistant_tool_calls(vec![ToolCall::new("c1", "bash", r#"{"command":"cargo test"}"#)]),
            Message::tool("c1", "1 failed"),
            Message::assistant("One test fails."),
            Message::user("fix it"),
        ];
        let response = completion(json!("User is fixing a bug."), Value::Null, "stop");
        let history = parse_compression_response(&messages, &response).unwrap();

        assert_eq!(
            history,
            "User is fixing a bug.\n\nLast 5 Messages:\n\
             User: fix the bug\n===========\n\
             Tool Use: bash\n===========\n\
             Tool Result: bash - 1 failed\n===========\n\
             Assistant: One test fails.\n===========\n\
             User: fix it"
        );
    }

    #[test]
    fn test_compression_scenario_keeps_pairing() {
        let messages = vec![
            Message::user("go"),
            Message::assistant_tool_calls(vec![ToolCall::new("c1", "bash", "{}")]),
            Message::tool("c1", "ok"),
            Message::assistant("done"),
            Message::user("next"),
        ];
        let plan = plan_compression(&messages);
        assert_eq!(plan.retained.len(), 1);
        assert_eq!(check_tool_pairing(&plan.retained), Ok(()));
    }
}
