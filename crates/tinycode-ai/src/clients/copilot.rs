//! GitHub Copilot transport
//!
//! A GitHub OAuth token obtained through the device flow is kept in the
//! [`AuthStore`] and exchanged for a short-lived Copilot token before chat
//! requests.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use super::auth::{AuthStore, AuthTokens};
use crate::transport::Transport;
use crate::{Error, Result};

const CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
const DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const COPILOT_TOKEN_URL: &str = "https://api.github.com/copilot_internal/v2/token";
const COPILOT_CHAT_URL: &str = "https://api.githubcopilot.com/chat/completions";

const USER_AGENT: &str = "GitHubCopilotChat/0.26.7";
const EDITOR_VERSION: &str = "vscode/1.99.3";
const EDITOR_PLUGIN_VERSION: &str = "copilot-chat/0.26.7";

/// Key in the token store
const STORE_KEY: &str = "github";

/// What the user must do to authorize this device
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct CopilotTokenResponse {
    token: String,
    /// Seconds since the epoch
    expires_at: i64,
}

/// Callback shown the device code during login
pub type DevicePrompt = Arc<dyn Fn(&DeviceAuthorization) + Send + Sync>;

enum PollOutcome {
    Authorized(String),
    Pending,
    SlowDown,
}

/// Copilot chat completions client
pub struct CopilotClient {
    http: reqwest::Client,
    store: AuthStore,
    on_device_code: DevicePrompt,
}

impl CopilotClient {
    pub fn new(store: AuthStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
            on_device_code: Arc::new(|auth: &DeviceAuthorization| {
                tracing::warn!(
                    "Authorize GitHub Copilot at {} with code {}",
                    auth.verification_uri,
                    auth.user_code
                );
            }),
        }
    }

    /// Set how the device code is presented to the user
    pub fn with_device_prompt(mut self, prompt: DevicePrompt) -> Self {
        self.on_device_code = prompt;
        self
    }

    fn default_headers(request: RequestBuilder) -> RequestBuilder {
        request
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .header("Editor-Version", EDITOR_VERSION)
    }

    /// Exchange the stored GitHub token for a Copilot token, reusing a
    /// still-valid one. `None` when no GitHub token exists or it was refused.
    async fn copilot_token(&self) -> Result<Option<String>> {
        let Some(tokens) = self.store.get(STORE_KEY) else {
            return Ok(None);
        };
        let Some(refresh) = tokens.refresh.clone() else {
            return Ok(None);
        };
        if let Some(access) = tokens.valid_access(chrono::Utc::now().timestamp_millis()) {
            return Ok(Some(access.to_string()));
        }

        let response = Self::default_headers(self.http.get(COPILOT_TOKEN_URL))
            .bearer_auth(&refresh)
            .header("Editor-Plugin-Version", EDITOR_PLUGIN_VERSION)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("Copilot token exchange refused: {}", response.status());
            return Ok(None);
        }

        let data: CopilotTokenResponse = response.json().await?;
        self.store.set(
            STORE_KEY,
            AuthTokens {
                refresh: Some(refresh),
                access: Some(data.token.clone()),
                expires: Some(data.expires_at * 1000),
            },
        )?;

        Ok(Some(data.token))
    }

    async fn start_device_authorization(&self) -> Result<DeviceAuthorization> {
        let response = Self::default_headers(self.http.post(DEVICE_CODE_URL))
            .json(&json!({ "client_id": CLIENT_ID, "scope": "read:user" }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("device code request failed: {} {}", status, body)));
        }

        Ok(response.json().await?)
    }

    async fn poll_access_token(&self, device_code: &str) -> Result<PollOutcome> {
        let response = Self::default_headers(self.http.post(ACCESS_TOKEN_URL))
            .json(&json!({
                "client_id": CLIENT_ID,
                "device_code": device_code,
                "grant_type": "urn:ietf:params:oauth:grant-type:device_code",
            }))
            .send()
            .await?;

        let data: AccessTokenResponse = response.json().await?;
        classify_poll(data)
    }

    /// Run the device flow until the user authorizes, then store the token.
    pub async fn login(&self) -> Result<()> {
        let auth = self.start_device_authorization().await?;
        (self.on_device_code)(&auth);

        let mut interval = auth.interval.max(1);
        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            match self.poll_access_token(&auth.device_code).await? {
                PollOutcome::Authorized(token) => {
                    self.store.set(
                        STORE_KEY,
                        AuthTokens {
                            refresh: Some(token),
                            access: None,
                            expires: Some(0),
                        },
                    )?;
                    return Ok(());
                }
                PollOutcome::Pending => {}
                PollOutcome::SlowDown => interval += 5,
            }
        }
    }

    async fn authenticate(&self) -> Result<String> {
        if let Some(token) = self.copilot_token().await? {
            return Ok(token);
        }

        self.login().await?;

        self.copilot_token()
            .await?
            .ok_or_else(|| Error::Auth("Failed to obtain GitHub Copilot token.".to_string()))
    }
}

fn classify_poll(data: AccessTokenResponse) -> Result<PollOutcome> {
    if let Some(token) = data.access_token.filter(|t| !t.is_empty()) {
        return Ok(PollOutcome::Authorized(token));
    }
    match data.error.as_deref() {
        Some("authorization_pending") => Ok(PollOutcome::Pending),
        Some("slow_down") => Ok(PollOutcome::SlowDown),
        _ => Err(Error::Auth(
            data.error_description
                .unwrap_or_else(|| "Authorization failed".to_string()),
        )),
    }
}

#[async_trait]
impl Transport for CopilotClient {
    fn name(&self) -> &str {
        "copilot"
    }

    async fn send(&self, body: String) -> Result<Value> {
        let token = self.authenticate().await?;

        let response = Self::default_headers(self.http.post(COPILOT_CHAT_URL))
            .bearer_auth(token)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::transport("Copilot API", status.as_u16(), text));
        }

        Ok(response.json().await?)
    }
}
