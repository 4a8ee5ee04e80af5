//! Error types for tinycode-agent

use thiserror::Error;

/// Result type alias using tinycode-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during agent operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the protocol or transport layer
    #[error(transparent)]
    Ai(#[from] tinycode_ai::Error),

    /// Reading user input failed
    #[error("Input error: {0}")]
    Input(String),

    /// Loading or saving a session failed
    #[error("Session error: {0}")]
    Session(String),

    /// A generic agent error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error should stop the program instead of being reported
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Ai(e) => e.is_configuration(),
            _ => false,
        }
    }
}
