//! Agent event types

use tinycode_ai::{Message, TranscriptEntry};

/// Events emitted during agent execution
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A conversation entry to show the user
    Transcript(TranscriptEntry),

    /// Context compaction started
    CompactionStart { messages: usize },

    /// Context compaction completed
    CompactionEnd { messages_before: usize, messages_after: usize },

    /// The threshold was reached but nothing could be compacted
    CompactionSkipped { messages: usize },

    /// An iteration failed; the loop goes on awaiting input
    Error {
        message: String,
        /// The last two buffer entries at the time of failure
        last_messages: Vec<Message>,
    },
}

impl AgentEvent {
    /// Check if this is an error event
    pub fn is_error(&self) -> bool {
        matches!(self, AgentEvent::Error { .. })
    }
}
