//! SAP AI Core transport (content-block models behind a deployment)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::transport::Transport;
use crate::{Error, Result};

/// Tokens are refreshed this long before the server says they expire
const EXPIRY_MARGIN_SECS: u64 = 10;

#[derive(Debug, Default, Deserialize)]
struct ServiceKey {
    #[serde(default)]
    serviceurls: ServiceUrls,
    #[serde(default)]
    url: String,
    #[serde(default)]
    clientid: String,
    #[serde(default)]
    clientsecret: String,
    #[serde(default)]
    deploymentid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceUrls {
    #[serde(rename = "AI_API_URL", default)]
    ai_api_url: String,
}

/// Connection settings for an AI Core deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SapConfig {
    pub api_url: String,
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub deployment_id: String,
    pub resource_group: String,
}

impl SapConfig {
    /// Fallback location of the service key
    pub fn service_key_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tinycode")
            .join(".aicore.json")
    }

    /// Read the service key from `AICORE_SERVICE_KEY` or ~/.tinycode/.aicore.json.
    ///
    /// `DEPLOYMENT_ID` overrides the key's deployment; `RESOURCE_GROUP`
    /// defaults to `default`.
    pub fn from_env() -> Result<Self> {
        let raw = match std::env::var("AICORE_SERVICE_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                let path = Self::service_key_path();
                std::fs::read_to_string(&path).map_err(|e| {
                    Error::InvalidConfig(format!(
                        "AICORE_SERVICE_KEY is not set and {} could not be read: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        };

        Self::from_service_key(
            &raw,
            std::env::var("DEPLOYMENT_ID").ok(),
            std::env::var("RESOURCE_GROUP").ok(),
        )
    }

    pub fn from_service_key(
        raw: &str,
        deployment_id: Option<String>,
        resource_group: Option<String>,
    ) -> Result<Self> {
        let key: ServiceKey = serde_json::from_str(raw)
            .map_err(|e| Error::InvalidConfig(format!("invalid AI Core service key: {}", e)))?;

        let deployment_id = deployment_id
            .filter(|d| !d.is_empty())
            .or(key.deploymentid)
            .unwrap_or_default();

        let config = Self {
            api_url: key.serviceurls.ai_api_url.trim_end_matches('/').to_string(),
            auth_url: key.url.trim_end_matches('/').to_string(),
            client_id: key.clientid,
            client_secret: key.clientsecret,
            deployment_id,
            resource_group: resource_group
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| "default".to_string()),
        };

        for (field, value) in [
            ("serviceurls.AI_API_URL", &config.api_url),
            ("url", &config.auth_url),
            ("clientid", &config.client_id),
            ("clientsecret", &config.client_secret),
            ("deployment id", &config.deployment_id),
        ] {
            if value.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "AI Core service key is missing {}",
                    field
                )));
            }
        }

        Ok(config)
    }

    /// Inference endpoint of the deployment
    pub fn invoke_url(&self) -> String {
        format!(
            "{}/v2/inference/deployments/{}/invoke",
            self.api_url, self.deployment_id
        )
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Client-credentials authenticated AI Core client
pub struct SapClient {
    config: SapConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl SapClient {
    pub fn new(config: SapConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.expires_at) {
            return Ok(token.value.clone());
        }

        tracing::debug!("requesting AI Core access token");
        let response = self
            .http
            .post(format!("{}/oauth/token", self.config.auth_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("AI Core token request failed: {} {}", status, body)));
        }

        let data: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(data.expires_in.saturating_sub(EXPIRY_MARGIN_SECS));
        *cached = Some(CachedToken {
            value: data.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(data.access_token)
    }
}

#[async_trait]
impl Transport for SapClient {
    fn name(&self) -> &str {
        "sap"
    }

    async fn send(&self, body: String) -> Result<Value> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(self.config.invoke_url())
            .header("Content-Type", "application/json")
            .header("AI-Resource-Group", &self.config.resource_group)
            .bearer_auth(token)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::transport("SAP AI", status.as_u16(), text));
        }

        Ok(response.json().await?)
    }
}
