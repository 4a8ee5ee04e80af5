//! The agent loop: tool execution, user input, compaction and chat.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tinycode_ai::{Message, ToolDefinition, TranscriptEntry};

use crate::{
    conversation::{AgentSession, SessionStore},
    error::{Error, Result},
    events::AgentEvent,
    provider::ChatProvider,
    tool::ToolRegistry,
};

/// Buffer entries attached to an error report
const ERROR_CONTEXT_MESSAGES: usize = 2;

/// Callback receiving agent events
pub type EventHandler = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

/// What an iteration does before talking to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Answer the tool calls of the last response
    ToolExecution,
    /// Wait for the user
    AwaitingInput,
}

/// One unit of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// Text to send to the model
    Message(String),
    /// A command was handled locally; nothing to send
    Handled,
    /// A command replaced the current session
    SessionChanged,
    /// End of input
    Exit,
}

/// Source of user input.
///
/// Receives the live session so local commands can replace it.
#[async_trait]
pub trait InputSource: Send {
    async fn read(&mut self, session: &mut AgentSession) -> Result<UserInput>;
}

/// Whether the loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Exit,
}

/// The main agent that orchestrates conversations
pub struct Agent {
    provider: ChatProvider,
    tools: Arc<ToolRegistry>,
    definitions: Vec<ToolDefinition>,
    store: Arc<dyn SessionStore>,
    session: AgentSession,
    workspace_root: PathBuf,
    on_event: Option<EventHandler>,
    /// Set after a failure until the user supplies input again
    force_input: bool,
}

impl Agent {
    pub fn new(
        provider: ChatProvider,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
        session: AgentSession,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        let definitions = tools.definitions();
        Self {
            provider,
            tools,
            definitions,
            store,
            session,
            workspace_root: workspace_root.into(),
            on_event: None,
            force_input: false,
        }
    }

    /// Register the event handler
    pub fn on_event(mut self, handler: EventHandler) -> Self {
        self.on_event = Some(handler);
        self
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(handler) = &self.on_event {
            handler(&event);
        }
    }

    /// State of the next iteration
    pub fn loop_state(&self) -> LoopState {
        if !self.force_input && self.provider.needs_tool_processing(self.session.stop_reason.as_ref()) {
            LoopState::ToolExecution
        } else {
            LoopState::AwaitingInput
        }
    }

    /// Emit the transcript of the whole live buffer
    pub fn replay(&self) {
        for entry in self.provider.transcript(&self.session.messages) {
            self.emit(AgentEvent::Transcript(entry));
        }
    }

    /// Replay the restored session, then iterate until input ends.
    pub async fn run(&mut self, input: &mut dyn InputSource) {
        self.replay();
        while self.step(input).await == StepOutcome::Continue {}
    }

    /// One loop iteration. Failures are reported as events, never returned;
    /// the session is persisted whatever happened.
    pub async fn step(&mut self, input: &mut dyn InputSource) -> StepOutcome {
        let outcome = match self.advance(input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("iteration failed: {}", e);
                self.emit(AgentEvent::Error {
                    message: e.to_string(),
                    last_messages: self.session.last_messages(ERROR_CONTEXT_MESSAGES).to_vec(),
                });
                self.force_input = true;
                // A broken input source would fail every later read too
                if e.is_fatal() || matches!(e, Error::Input(_)) {
                    StepOutcome::Exit
                } else {
                    StepOutcome::Continue
                }
            }
        };

        self.persist();
        outcome
    }

    async fn advance(&mut self, input: &mut dyn InputSource) -> Result<StepOutcome> {
        match self.loop_state() {
            LoopState::ToolExecution => {
                let handler = self.on_event.clone();
                let mut log = |entry: TranscriptEntry| {
                    if let Some(handler) = &handler {
                        handler(&AgentEvent::Transcript(entry));
                    }
                };
                let replies = self
                    .provider
                    .dispatch_tools(
                        &self.session.messages,
                        self.tools.as_ref(),
                        &self.workspace_root,
                        &mut log,
                    )
                    .await;

                match replies {
                    Some(replies) => self.session.messages.extend(replies),
                    None => {
                        tracing::warn!("tool processing requested but the last message has no tool calls");
                        self.force_input = true;
                        return Ok(StepOutcome::Continue);
                    }
                }
            }
            LoopState::AwaitingInput => match input.read(&mut self.session).await? {
                UserInput::Message(text) if !text.trim().is_empty() => {
                    self.force_input = false;
                    self.session.messages.push(Message::user(text));
                }
                UserInput::Message(_) | UserInput::Handled => return Ok(StepOutcome::Continue),
                UserInput::SessionChanged => {
                    self.force_input = false;
                    self.replay();
                    return Ok(StepOutcome::Continue);
                }
                UserInput::Exit => return Ok(StepOutcome::Exit),
            },
        }

        if self.provider.should_compress(self.session.messages.len()) {
            self.compact().await?;
        }

        let response = self
            .provider
            .chat(&self.session.messages, &self.definitions, &self.session.history)
            .await?;
        for entry in self.provider.transcript(&response.messages) {
            self.emit(AgentEvent::Transcript(entry));
        }
        self.session.messages.extend(response.messages);
        self.session.stop_reason = response.stop_reason;

        Ok(StepOutcome::Continue)
    }

    /// Replace buffer and history with the compacted versions. A failure
    /// leaves both untouched.
    async fn compact(&mut self) -> Result<()> {
        let before = self.session.messages.len();
        self.emit(AgentEvent::CompactionStart { messages: before });

        let outcome = self
            .provider
            .compress(self.session.messages.clone(), self.session.history.clone())
            .await?;

        if outcome.compacted {
            self.session.messages = outcome.messages;
            self.session.history = outcome.history;
            self.emit(AgentEvent::CompactionEnd {
                messages_before: before,
                messages_after: self.session.messages.len(),
            });
        } else {
            self.emit(AgentEvent::CompactionSkipped { messages: before });
        }
        Ok(())
    }

    fn persist(&self) {
        let record = self
            .session
            .to_record(self.provider.provider_name(), self.provider.model());
        if let Err(e) = self.store.save(&record) {
            tracing::warn!(session = %self.session.id, "failed to save session: {}", e);
        }
    }
}
