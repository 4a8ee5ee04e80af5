//! Terminal rendering of agent events

use crossterm::style::Stylize;
use serde_json::Value;
use tinycode_agent::AgentEvent;
use tinycode_ai::{Message, TranscriptEntry};

use crate::utils::truncate_chars;

const ARGUMENT_PREVIEW_CHARS: usize = 50;
const RESULT_PREVIEW_LINES: usize = 2;
const RESULT_PREVIEW_CHARS: usize = 80;

/// Header plus one line per argument
pub fn tool_use_lines(name: &str, input: &Value) -> Vec<String> {
    let mut lines = vec![format!("● ToolUse(name: \"{}\")", name)];
    let Some(arguments) = input.as_object() else {
        return lines;
    };

    let last = arguments.len().saturating_sub(1);
    for (i, (key, value)) in arguments.iter().enumerate() {
        let branch = if i == last { "└" } else { "├" };
        let display = match value {
            Value::String(s) => truncate_chars(s, ARGUMENT_PREVIEW_CHARS),
            other => other.to_string(),
        };
        lines.push(format!("  {} \"{}\": {}", branch, key, display));
    }
    lines
}

/// Header plus a short preview of the result
pub fn tool_result_lines(name: &str, content: &str) -> Vec<String> {
    let mut lines = vec![format!("✔ ToolResult(name: \"{}\")", name)];
    let content_lines: Vec<&str> = content.split('\n').collect();
    for line in content_lines.iter().take(RESULT_PREVIEW_LINES) {
        lines.push(format!("  └ {}", truncate_chars(line, RESULT_PREVIEW_CHARS)));
    }
    if content_lines.len() > RESULT_PREVIEW_LINES {
        lines.push(format!(
            "  ... ({} more)",
            content_lines.len() - RESULT_PREVIEW_LINES
        ));
    }
    lines
}

pub fn transcript(entry: &TranscriptEntry) {
    match entry {
        TranscriptEntry::User(text) => println!("{}", format!("> {}", text).white().bold()),
        TranscriptEntry::Assistant(text) => {
            println!("{}", format!("TinyCode: {}", text).dark_grey().bold())
        }
        TranscriptEntry::ToolUse { name, input } => {
            for line in tool_use_lines(name, input) {
                println!("{}", line.yellow());
            }
        }
        TranscriptEntry::ToolResult { name, content } => {
            for line in tool_result_lines(name, content) {
                println!("{}", line.green());
            }
        }
    }
    println!();
}

pub fn event(event: &AgentEvent) {
    match event {
        AgentEvent::Transcript(entry) => transcript(entry),
        AgentEvent::CompactionStart { messages } => {
            println!("{}", format!("[Compacting {} messages]", messages).dim());
        }
        AgentEvent::CompactionEnd {
            messages_before,
            messages_after,
        } => {
            println!(
                "{}",
                format!("[Compacted: {} -> {} messages]", messages_before, messages_after).dim()
            );
        }
        AgentEvent::CompactionSkipped { messages } => {
            tracing::debug!(messages, "compaction found no safe boundary");
        }
        AgentEvent::Error {
            message,
            last_messages,
        } => error(message, last_messages),
    }
}

pub fn error(message: &str, last_messages: &[Message]) {
    eprintln!("{}", format!("Error occurred while processing: {}", message).red());
    if last_messages.is_empty() {
        return;
    }
    eprintln!("{}", "Last two messages:".red());
    for msg in last_messages {
        match serde_json::to_string_pretty(msg) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("{:?}", msg),
        }
    }
    eprintln!();
}

pub fn info(message: &str) {
    println!("{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_use_lines() {
        let long = "x".repeat(60);
        let lines = tool_use_lines("bash", &json!({"command": long, "restart": true}));
        assert_eq!(lines[0], "● ToolUse(name: \"bash\")");
        assert_eq!(lines[1], format!("  ├ \"command\": {}...", "x".repeat(50)));
        assert_eq!(lines[2], "  └ \"restart\": true");
    }

    #[test]
    fn test_tool_use_without_arguments() {
        assert_eq!(tool_use_lines("todo", &json!({})), vec!["● ToolUse(name: \"todo\")"]);
        assert_eq!(tool_use_lines("todo", &Value::Null).len(), 1);
    }

    #[test]
    fn test_tool_result_preview() {
        let lines = tool_result_lines("bash", "stdout:\na\nb\nc");
        assert_eq!(
            lines,
            vec![
                "✔ ToolResult(name: \"bash\")",
                "  └ stdout:",
                "  └ a",
                "  ... (2 more)",
            ]
        );

        let lines = tool_result_lines("todo", "No todos found.");
        assert_eq!(lines.len(), 2);
    }
}
