//! Transport abstraction: one JSON request out, one JSON response back

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Sends an encoded request body to a chat backend.
///
/// Implementations own authentication and token refresh. A non-success
/// status must surface as [`crate::Error::Transport`]; no retries happen here.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Backend name for diagnostics
    fn name(&self) -> &str;

    /// POST the body and return the decoded JSON response
    async fn send(&self, body: String) -> Result<Value>;
}
