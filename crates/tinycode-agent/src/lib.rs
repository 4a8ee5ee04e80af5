//! tinycode-agent: the conversation loop with tool execution
//!
//! This crate drives the read / dispatch / compact / chat cycle over a
//! [`ChatProvider`], answering tool calls through a [`ToolRegistry`] and
//! persisting the session after every iteration.

pub mod agent;
pub mod compaction;
pub mod conversation;
pub mod error;
pub mod events;
pub mod provider;
pub mod tool;

pub use agent::{Agent, EventHandler, InputSource, LoopState, StepOutcome, UserInput};
pub use compaction::{CompactionConfig, CompressionOutcome};
pub use conversation::{AgentSession, SessionRecord, SessionStore};
pub use error::{Error, Result};
pub use events::AgentEvent;
pub use provider::ChatProvider;
pub use tool::{BoxedTool, Tool, ToolRegistry};
