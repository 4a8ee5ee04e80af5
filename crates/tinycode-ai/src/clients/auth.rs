//! Token store for backend credentials
//!
//! Stored at ~/.tinycode.json with restricted permissions (0o600), keyed by
//! provider (`github` for Copilot).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::Result;

/// Tokens for one provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    /// Long-lived token used to obtain access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    /// Short-lived access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    /// Access token expiry in milliseconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

impl AuthTokens {
    /// Access token, if present and not yet expired
    pub fn valid_access(&self, now_millis: i64) -> Option<&str> {
        match (&self.access, self.expires) {
            (Some(access), Some(expires)) if !access.is_empty() && expires > now_millis => {
                Some(access.as_str())
            }
            _ => None,
        }
    }
}

/// JSON file mapping provider name to tokens
#[derive(Debug, Clone)]
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    /// Store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// ~/.tinycode.json
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tinycode.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> HashMap<String, AuthTokens> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable token store {}: {}", self.path.display(), e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }

    /// Tokens for a provider
    pub fn get(&self, provider: &str) -> Option<AuthTokens> {
        self.load_all().remove(provider)
    }

    /// Replace the tokens for a provider
    pub fn set(&self, provider: &str, tokens: AuthTokens) -> Result<()> {
        let mut all = self.load_all();
        all.insert(provider.to_string(), tokens);

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;

        #[cfg(unix)]
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_merge() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::new(dir.path().join("auth.json"));

        assert!(store.get("github").is_none());

        let github = AuthTokens {
            refresh: Some("gho_refresh".into()),
            access: None,
            expires: Some(0),
        };
        store.set("github", github.clone()).unwrap();
        store.set("other", AuthTokens::default()).unwrap();

        assert_eq!(store.get("github"), Some(github));
        assert!(store.get("other").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::new(dir.path().join("auth.json"));
        store.set("github", AuthTokens::default()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_store_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        fs::write(&path, "{not json").unwrap();
        assert!(AuthStore::new(path).get("github").is_none());
    }

    #[test]
    fn test_valid_access() {
        let tokens = AuthTokens {
            refresh: Some("r".into()),
            access: Some("a".into()),
            expires: Some(2_000),
        };
        assert_eq!(tokens.valid_access(1_000), Some("a"));
        assert_eq!(tokens.valid_access(2_000), None);

        let empty = AuthTokens {
            access: Some(String::new()),
            expires: Some(i64::MAX),
            ..Default::default()
        };
        assert_eq!(empty.valid_access(0), None);
    }
}
