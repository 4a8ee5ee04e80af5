//! Error types for tinycode-ai

use thiserror::Error;

/// Result type alias using tinycode-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend answered with a non-success status
    #[error("{backend} request failed: {status} {body}")]
    Transport {
        backend: &'static str,
        status: u16,
        body: String,
    },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Response did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Provider name is not known
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Model is not mapped for the chosen provider
    #[error("Unsupported model '{model}' for provider '{provider}'. Supported models: {supported}")]
    UnsupportedModel {
        model: String,
        provider: String,
        supported: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local I/O failed (credential files, token store)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a transport error from a status code and response body
    pub fn transport(backend: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            backend,
            status,
            body: body.into(),
        }
    }

    /// Configuration errors are fatal before the agent loop starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownProvider(_) | Error::UnsupportedModel { .. } | Error::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_model_message() {
        let e = Error::UnsupportedModel {
            model: "gpt-5".into(),
            provider: "copilot".into(),
            supported: "claude-sonnet-4, gpt-4, gpt-4o".into(),
        };
        assert_eq!(
            e.to_string(),
            "Unsupported model 'gpt-5' for provider 'copilot'. Supported models: claude-sonnet-4, gpt-4, gpt-4o"
        );
    }

    #[test]
    fn test_transport_message() {
        let e = Error::transport("Copilot API", 401, "bad token");
        assert_eq!(e.to_string(), "Copilot API request failed: 401 bad token");
    }

    #[test]
    fn test_is_configuration() {
        assert!(Error::UnknownProvider("x".into()).is_configuration());
        assert!(Error::InvalidConfig("missing key".into()).is_configuration());
        assert!(!Error::Auth("nope".into()).is_configuration());
        assert!(!Error::transport("SAP AI", 500, "").is_configuration());
    }
}
