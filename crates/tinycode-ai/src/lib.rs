//! tinycode-ai: message model, wire protocols and backend clients
//!
//! Two backend wire formats (content blocks and function calls) are
//! normalized into one [`Message`] model. Each [`protocol::Protocol`]
//! variant encodes requests, decodes responses and owns its compaction
//! policy; [`transport::Transport`] implementations move the bytes.

pub mod clients;
pub mod error;
pub mod models;
pub mod protocol;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use protocol::{CompactionPlan, Protocol, ToolExecutor};
pub use transport::Transport;
pub use types::*;
