//! Line-oriented console input

use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tinycode_agent::{AgentSession, Error, InputSource, Result, UserInput};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::commands::{CommandContext, CommandResult, execute_command};
use crate::render;
use crate::session::FileSessionStore;
use crate::tools::Confirm;

/// Answers that approve a command; an empty line counts as yes
const APPROVALS: [&str; 5] = ["yes", "y", "confirm", "ok", ""];

pub fn is_approval(answer: &str) -> bool {
    APPROVALS.contains(&answer.trim().to_lowercase().as_str())
}

/// Shared reader over stdin; questions and prompts take turns on it
pub struct Prompter {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Prompter {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Print `question` and read one line. `None` at end of input.
    pub async fn ask(&self, question: &str) -> std::io::Result<Option<String>> {
        let mut lines = self.lines.lock().await;
        print!("{}", question);
        std::io::stdout().flush()?;
        lines.next_line().await
    }
}

impl Default for Prompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Confirm for Prompter {
    async fn confirm(&self, question: &str) -> bool {
        match self.ask(question).await {
            Ok(Some(answer)) => is_approval(&answer),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("failed to read confirmation: {}", e);
                false
            }
        }
    }
}

/// Prompts for user input and runs slash commands before they reach the agent
pub struct ConsoleInput {
    prompter: Arc<Prompter>,
    store: Arc<FileSessionStore>,
    tool_names: Vec<String>,
}

impl ConsoleInput {
    pub fn new(prompter: Arc<Prompter>, store: Arc<FileSessionStore>, tool_names: Vec<String>) -> Self {
        Self {
            prompter,
            store,
            tool_names,
        }
    }
}

#[async_trait]
impl InputSource for ConsoleInput {
    async fn read(&mut self, session: &mut AgentSession) -> Result<UserInput> {
        let line = self
            .prompter
            .ask("> ")
            .await
            .map_err(|e| Error::Input(e.to_string()))?;
        let Some(line) = line else {
            return Ok(UserInput::Exit);
        };

        let ctx = CommandContext {
            store: &self.store,
            tool_names: self.tool_names.clone(),
        };
        Ok(match execute_command(&line, &ctx, session) {
            None => UserInput::Message(line.trim().to_string()),
            Some(CommandResult::Message(message)) => {
                render::info(&message);
                UserInput::Handled
            }
            Some(CommandResult::SessionChanged(message)) => {
                render::info(&message);
                UserInput::SessionChanged
            }
            Some(CommandResult::Exit) => UserInput::Exit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_approval() {
        for answer in ["yes", "Y", " ok ", "confirm", ""] {
            assert!(is_approval(answer), "{:?} should approve", answer);
        }
        for answer in ["no", "n", "nope", "yess"] {
            assert!(!is_approval(answer), "{:?} should decline", answer);
        }
    }
}
