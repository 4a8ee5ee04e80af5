//! Transport implementations for the supported backends

pub mod auth;
pub mod copilot;
pub mod sap;

use std::sync::Arc;

pub use auth::{AuthStore, AuthTokens};
pub use copilot::{CopilotClient, DeviceAuthorization, DevicePrompt};
pub use sap::{SapClient, SapConfig};

use crate::Result;
use crate::models::Backend;
use crate::transport::Transport;

/// Build the transport for a backend from the environment.
///
/// SAP credentials are read eagerly so a missing service key fails before
/// the agent starts. Copilot authenticates lazily on the first request.
pub fn connect(backend: Backend, device_prompt: Option<DevicePrompt>) -> Result<Arc<dyn Transport>> {
    match backend {
        Backend::Sap => Ok(Arc::new(SapClient::new(SapConfig::from_env()?))),
        Backend::Copilot => {
            let mut client = CopilotClient::new(AuthStore::new(AuthStore::default_path()));
            if let Some(prompt) = device_prompt {
                client = client.with_device_prompt(prompt);
            }
            Ok(Arc::new(client))
        }
    }
}
