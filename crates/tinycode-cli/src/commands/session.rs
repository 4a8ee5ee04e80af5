//! /sessions, /new, /load and /remove

use super::CommandResult;
use tinycode_agent::AgentSession;

use crate::session::{FileSessionStore, StoredSession};
use crate::utils::short_id;

fn date(session: &StoredSession) -> String {
    session.updated_at.format("%Y-%m-%d").to_string()
}

fn usage(store: &FileSessionStore, command: &str) -> CommandResult {
    let mut output = format!("Usage: /{} <sessionId>\nAvailable sessions:", command);
    for (i, session) in store.list().iter().enumerate() {
        output.push_str(&format!("\n{}. {} - {}", i + 1, short_id(session.id()), session.title));
    }
    CommandResult::Message(output)
}

fn fresh_session() -> AgentSession {
    AgentSession::new(uuid::Uuid::new_v4().to_string())
}

pub fn list(store: &FileSessionStore) -> CommandResult {
    let sessions = store.list();
    if sessions.is_empty() {
        return CommandResult::Message("No sessions found.".to_string());
    }

    let mut output = String::from("Available sessions:");
    for (i, session) in sessions.iter().enumerate() {
        output.push_str(&format!(
            "\n{}. {} - {} ({})",
            i + 1,
            short_id(session.id()),
            session.title,
            date(session)
        ));
    }
    CommandResult::Message(output)
}

pub fn new(current: &mut AgentSession) -> CommandResult {
    *current = fresh_session();
    CommandResult::SessionChanged(format!("Created new session: {}", short_id(&current.id)))
}

pub fn load(store: &FileSessionStore, id: Option<&str>, current: &mut AgentSession) -> CommandResult {
    let Some(id) = id else {
        return usage(store, "load");
    };

    match store.read(&store.resolve_id(id)) {
        Ok(Some(stored)) => {
            let title = stored.title.clone();
            *current = AgentSession::from_record(stored.record);
            CommandResult::SessionChanged(format!("Loaded session: {}", title))
        }
        Ok(None) => CommandResult::Message(format!("Session not found: {}", id)),
        Err(e) => CommandResult::Message(format!("Failed to load session {}: {}", id, e)),
    }
}

pub fn remove(store: &FileSessionStore, id: Option<&str>, current: &mut AgentSession) -> CommandResult {
    let Some(id) = id else {
        return usage(store, "remove");
    };

    let full_id = store.resolve_id(id);
    match store.remove(&full_id) {
        Ok(true) if full_id == current.id => {
            *current = fresh_session();
            CommandResult::SessionChanged(format!(
                "Removed session: {}\nCreated new session: {}",
                id,
                short_id(&current.id)
            ))
        }
        Ok(true) => CommandResult::Message(format!("Removed session: {}", id)),
        Ok(false) => CommandResult::Message(format!("Session not found: {}", id)),
        Err(e) => CommandResult::Message(format!("Failed to remove session {}: {}", id, e)),
    }
}
