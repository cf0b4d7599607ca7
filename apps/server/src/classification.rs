//! ICD-11 classification authority client
//!
//! Authenticates with OAuth2 client credentials, keeps the bearer token until
//! shortly before it expires and looks codes up through the MMS `codeinfo`
//! endpoint. Every transport-level problem degrades to
//! [`Resolution::Unreachable`] so validation can carry on with a warning.

use crate::config::ClassificationConfig;
use async_trait::async_trait;
use medisync_terminology::{CodeEntry, CodeResolver, Resolution};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

const TOKEN_SCOPE: &str = "icdapi_access";
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct ClassificationClient {
    http: reqwest::Client,
    base_url: Url,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    release: String,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl std::fmt::Debug for ClassificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationClient")
            .field("base_url", &self.base_url)
            .field("release", &self.release)
            .finish_non_exhaustive()
    }
}

impl ClassificationClient {
    /// `None` unless both credentials are configured
    pub fn from_config(config: &ClassificationConfig) -> anyhow::Result<Option<Self>> {
        let Some((client_id, client_secret)) = config.credentials() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build classification HTTP client: {e}"))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("invalid classification base_url: {e}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("classification base_url cannot carry a path: {}", base_url);
        }

        Ok(Some(Self {
            http,
            base_url,
            token_endpoint: config.token_endpoint.clone(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            release: config.release.clone(),
            token: Arc::new(Mutex::new(None)),
        }))
    }

    /// The code is one path segment even when postcoordinated (`DA63/ME24.90`)
    fn codeinfo_url(&self, code: &str) -> Result<Url, String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| format!("base URL {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(["release", "11", self.release.as_str(), "mms", "codeinfo", code]);
        Ok(url)
    }

    async fn bearer_token(&self) -> Result<String, String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let res = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", TOKEN_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| format!("token request failed: {e}"))?;
        if !res.status().is_success() {
            return Err(format!("token endpoint returned HTTP {}", res.status()));
        }
        let body: TokenResponse = res
            .json()
            .await
            .map_err(|e| format!("token response parse failed: {e}"))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in = body.expires_in, "classification token refreshed");
        Ok(body.access_token)
    }

    async fn lookup(&self, system: &str, code: &str) -> Result<Resolution, String> {
        let token = self.bearer_token().await?;
        let res = self
            .http
            .get(self.codeinfo_url(code)?)
            .bearer_auth(token)
            .header("API-Version", "v2")
            .header("Accept", "application/json")
            .header("Accept-Language", "en")
            .send()
            .await
            .map_err(|e| format!("codeinfo request failed: {e}"))?;

        match res.status() {
            StatusCode::NOT_FOUND => Ok(Resolution::NotFound),
            status if status.is_success() => {
                let body: JsonValue = res
                    .json()
                    .await
                    .map_err(|e| format!("codeinfo response parse failed: {e}"))?;
                let found_code = body
                    .get("code")
                    .and_then(JsonValue::as_str)
                    .unwrap_or(code);
                let display = body
                    .get("title")
                    .and_then(|t| t.get("@value").or(Some(t)))
                    .and_then(JsonValue::as_str)
                    .unwrap_or(found_code);
                Ok(Resolution::Found(CodeEntry::new(
                    found_code,
                    display,
                    system,
                    None,
                    Vec::new(),
                )))
            }
            status => Err(format!("codeinfo returned HTTP {}", status)),
        }
    }
}

#[async_trait]
impl CodeResolver for ClassificationClient {
    async fn resolve(&self, system: &str, code: &str) -> Resolution {
        match self.lookup(system, code).await {
            Ok(resolution) => resolution,
            Err(reason) => {
                tracing::warn!(
                    system,
                    code,
                    reason = %reason,
                    "classification authority unreachable"
                );
                Resolution::Unreachable(reason)
            }
        }
    }
}
