//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for tinycode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default backend (`sap` or `copilot`)
    pub provider: Option<String>,
    /// Default model for the backend
    pub model: Option<String>,
    /// Buffer length that triggers compaction (0 disables it)
    pub max_messages: Option<usize>,
    /// Ask before running shell commands
    pub confirm_commands: Option<bool>,
    /// Seconds a shell command may run
    pub command_timeout_secs: Option<u64>,
    /// Custom system prompt file path
    pub system_prompt_file: Option<String>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tinycode")
    }

    /// `TINYCODE_CONFIG_PATH` if set, otherwise `<config dir>/tinycode/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TINYCODE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file; problems are reported and fall back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            provider: Some("copilot".to_string()),
            model: Some("gpt-4".to_string()),
            max_messages: Some(tinycode_agent::CompactionConfig::default().max_messages),
            confirm_commands: Some(true),
            command_timeout_secs: Some(crate::tools::DEFAULT_TIMEOUT.as_secs()),
            system_prompt_file: None,
        };

        default_config.save()?;
        Ok(path)
    }

    /// Contents of `system_prompt_file`, with `~/` expanded
    pub fn custom_system_prompt(&self) -> std::io::Result<Option<String>> {
        let Some(file) = self.system_prompt_file.as_deref() else {
            return Ok(None);
        };
        let path = match file.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(file)),
            None => PathBuf::from(file),
        };
        fs::read_to_string(path).map(Some)
    }
}

/// First non-empty value: command line, then environment, then config file
pub fn choose(cli: Option<&str>, env_var: &str, file: Option<&str>) -> Option<String> {
    let env = std::env::var(env_var).ok();
    [cli, env.as_deref(), file]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# tinycode configuration file
# Place at ~/.config/tinycode/config.toml (Linux) or set TINYCODE_CONFIG_PATH

# Backend: "copilot" (default) or "sap"
provider = "copilot"

# Model for the backend
#   copilot: gpt-4 (default), gpt-4o, claude-sonnet-4
#   sap:     bedrock-2023-05-31 (default), claude-3-sonnet, claude-3-haiku
model = "gpt-4"

# Compress older messages once the conversation holds this many (0 disables)
max_messages = 5

# Ask before every shell command (--yes turns this off for one run)
confirm_commands = true

# Seconds before a shell command is terminated
command_timeout_secs = 10

# Custom system prompt file (optional)
# system_prompt_file = "~/.config/tinycode/system_prompt.txt"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.provider.as_deref(), Some("copilot"));
        assert_eq!(config.model.as_deref(), Some("gpt-4"));
        assert_eq!(config.max_messages, Some(5));
        assert_eq!(config.confirm_commands, Some(true));
        assert_eq!(config.command_timeout_secs, Some(10));
        assert!(config.system_prompt_file.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config {
            provider: Some("sap".to_string()),
            max_messages: Some(0),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_invalid_or_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_from(&dir.path().join("absent.toml")), Config::default());

        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "provider = [").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_custom_system_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Be brief.").unwrap();

        let config = Config {
            system_prompt_file: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        };
        assert_eq!(config.custom_system_prompt().unwrap().as_deref(), Some("Be brief."));
        assert!(Config::default().custom_system_prompt().unwrap().is_none());
    }

    #[test]
    fn test_choose_prefers_command_line() {
        let unset = "TINYCODE_TEST_UNSET_VARIABLE";
        assert_eq!(choose(Some("sap"), unset, Some("copilot")).as_deref(), Some("sap"));
        assert_eq!(choose(None, unset, Some("copilot")).as_deref(), Some("copilot"));
        assert_eq!(choose(Some("  "), unset, None), None);
    }
}
