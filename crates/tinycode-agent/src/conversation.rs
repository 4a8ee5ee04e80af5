//! Conversation state and its persisted form.

use serde::{Deserialize, Serialize};
use tinycode_ai::{Message, StopReason};

use crate::error::Result;

/// Live state of one conversation, owned by the agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentSession {
    pub id: String,
    /// Live message buffer sent with every request
    pub messages: Vec<Message>,
    /// Running summary of everything compacted away
    pub history: String,
    /// Stop reason of the last response
    pub stop_reason: Option<StopReason>,
}

impl AgentSession {
    /// A fresh, empty session
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Restore a session from its persisted form
    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            messages: record.messages,
            history: record.history,
            stop_reason: record.stop_reason,
        }
    }

    /// Snapshot for persistence
    pub fn to_record(&self, provider: &str, model: &str) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            messages: self.messages.clone(),
            history: self.history.clone(),
            stop_reason: self.stop_reason.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }

    /// Last `n` buffer entries
    pub fn last_messages(&self, n: usize) -> &[Message] {
        &self.messages[self.messages.len().saturating_sub(n)..]
    }
}

/// What is saved after every loop iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
}

/// Where sessions are persisted
pub trait SessionStore: Send + Sync {
    fn save(&self, record: &SessionRecord) -> Result<()>;

    /// `None` when no session with that id exists
    fn load(&self, id: &str) -> Result<Option<SessionRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_round_trips_through_session() {
        let mut session = AgentSession::new("s1");
        session.messages.push(Message::user("hi"));
        session.history = "earlier".into();
        session.stop_reason = Some(StopReason::from("end_turn"));

        let record = session.to_record("sap", "claude-3-haiku");
        assert_eq!(record.provider, "sap");
        assert_eq!(AgentSession::from_record(record), session);
    }

    #[test]
    fn test_record_uses_camel_case() {
        let record = AgentSession::new("s1").to_record("copilot", "gpt-4");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["stopReason"], json!(null));
        assert_eq!(value["model"], "gpt-4");
    }

    #[test]
    fn test_last_messages() {
        let mut session = AgentSession::new("s1");
        assert!(session.last_messages(2).is_empty());
        session.messages = vec![Message::user("a"), Message::user("b"), Message::user("c")];
        assert_eq!(session.last_messages(2), &session.messages[1..]);
    }
}
