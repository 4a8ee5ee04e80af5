//! Slash commands for interactive mode

mod session;

use tinycode_agent::AgentSession;

use crate::session::FileSessionStore;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// The live session was replaced; show the message and redraw
    SessionChanged(String),
    /// Exit the application
    Exit,
}

/// What commands may look at besides the live session
pub struct CommandContext<'a> {
    pub store: &'a FileSessionStore,
    pub tool_names: Vec<String>,
}

/// Parse and execute a slash command. `None` means the input is a prompt.
pub fn execute_command(
    input: &str,
    ctx: &CommandContext<'_>,
    current: &mut AgentSession,
) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let command = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "quit" | "exit" | "q" => CommandResult::Exit,

        "tools" => CommandResult::Message(tools_message(&ctx.tool_names)),

        "sessions" => session::list(ctx.store),

        "new" => session::new(current),

        "load" => session::load(ctx.store, arg, current),

        "remove" => session::remove(ctx.store, arg, current),

        _ => CommandResult::Message(format!("Unknown command: {}\n{}", input, help_message())),
    })
}

fn tools_message(names: &[String]) -> String {
    let mut output = String::from("Available tools:");
    for name in names {
        output.push_str(&format!("\n- {}", name));
    }
    output
}

pub fn help_message() -> String {
    r#"Available commands:
/help - Show this help message
/tools - List available tools
/sessions - List all sessions
/new - Create a new session
/load <sessionId> - Load a session
/remove <sessionId> - Remove a session
/quit - Exit tinycode"#
        .to_string()
}
