//! Session persistence: one pretty-printed JSON file per conversation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tinycode_agent::{AgentSession, Error, Result, SessionRecord, SessionStore};
use tinycode_ai::Message;

/// A session file on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(flatten)]
    pub record: SessionRecord,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// First four words of the first user message, when it is plain text
pub fn session_title(messages: &[Message]) -> String {
    let first_user = messages.iter().find(|m| matches!(m, Message::User { .. }));
    match first_user.and_then(Message::user_text) {
        Some(text) => {
            let words: Vec<&str> = text.split_whitespace().take(4).collect();
            format!("{}...", words.join(" "))
        }
        None => "New session...".to_string(),
    }
}

fn session_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Session(format!("{}: {}", path.display(), e))
}

/// Sessions stored under `<workspace>/.tinycode/sessions`
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_workspace(workspace_root: &Path) -> Self {
        Self::new(workspace_root.join(".tinycode").join("sessions"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids that could escape the sessions directory have no file
    fn path(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
            return None;
        }
        Some(self.dir.join(format!("{}.json", id)))
    }

    pub fn read(&self, id: &str) -> Result<Option<StoredSession>> {
        let Some(path) = self.path(id) else {
            return Ok(None);
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(session_error(&path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| session_error(&path, e))
    }

    /// All readable sessions, most recently updated first
    pub fn list(&self) -> Vec<StoredSession> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut sessions: Vec<StoredSession> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| {
                let content = fs::read_to_string(&path).ok()?;
                match serde_json::from_str(&content) {
                    Ok(session) => Some(session),
                    Err(e) => {
                        tracing::debug!("skipping invalid session file {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    pub fn latest(&self) -> Option<StoredSession> {
        self.list().into_iter().next()
    }

    /// `false` when there was nothing to remove
    pub fn remove(&self, id: &str) -> Result<bool> {
        let Some(path) = self.path(id) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(session_error(&path, e)),
        }
    }

    /// Expand an eight-character short id to the full id of a stored session.
    /// Anything else is returned unchanged.
    pub fn resolve_id(&self, id: &str) -> String {
        if id.chars().count() == 8 {
            if let Some(session) = self.list().into_iter().find(|s| s.id().starts_with(id)) {
                return session.record.id;
            }
        }
        id.to_string()
    }

    /// The most recent session, or a fresh one that is saved on first use
    pub fn ensure(&self) -> AgentSession {
        match self.latest() {
            Some(stored) => AgentSession::from_record(stored.record),
            None => AgentSession::new(uuid::Uuid::new_v4().to_string()),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, record: &SessionRecord) -> Result<()> {
        let Some(path) = self.path(&record.id) else {
            return Err(Error::Session(format!("invalid session id: {}", record.id)));
        };
        fs::create_dir_all(&self.dir).map_err(|e| session_error(&self.dir, e))?;

        let now = Utc::now();
        let created_at = match self.read(&record.id) {
            Ok(Some(existing)) => existing.created_at,
            _ => now,
        };
        let stored = StoredSession {
            record: record.clone(),
            title: session_title(&record.messages),
            created_at,
            updated_at: now,
        };

        let json = serde_json::to_string_pretty(&stored).map_err(|e| session_error(&path, e))?;
        fs::write(&path, json).map_err(|e| session_error(&path, e))
    }

    fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.read(id)?.map(|stored| stored.record))
    }
}
