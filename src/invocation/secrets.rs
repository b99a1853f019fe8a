use super::InvocationError;
use crate::env::{env_or, AWS_SESSION_TOKEN_ENV, SECRETS_EXTENSION_PORT_ENV};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Header carrying the session token expected by the secrets extension.
pub const SECRETS_TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";

/// Source of raw secret strings.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the secret string stored under `name`.
    async fn get_secret(&self, name: &str) -> Result<String, InvocationError>;
}

/// Credentials and endpoints stored in the invocation secret.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(rename = "AUTH_API_URL")]
    pub auth_api_url: String,
    #[serde(rename = "PROTECTED_API_URL")]
    pub protected_api_url: String,
    #[serde(rename = "DOMAIN")]
    pub domain: String,
}

impl Credentials {
    /// Parse a secret string; every key is required.
    pub fn parse(secret: &str) -> Result<Self, InvocationError> {
        serde_json::from_str(secret).map_err(InvocationError::SecretFormat)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_api_url", &self.auth_api_url)
            .field("protected_api_url", &self.protected_api_url)
            .field("domain", &self.domain)
            .finish()
    }
}

/// Reads secrets through the Parameters and Secrets Lambda extension,
/// which serves Secrets Manager values over local HTTP.
#[derive(Clone)]
pub struct ExtensionSecretStore {
    client: Client,
    base_url: String,
    session_token: Option<String>,
}

#[derive(Deserialize)]
struct ExtensionResponse {
    #[serde(rename = "SecretString")]
    secret_string: Option<String>,
}

impl ExtensionSecretStore {
    pub fn new(base_url: impl Into<String>, session_token: Option<String>) -> Self {
        ExtensionSecretStore {
            client: Client::new(),
            base_url: base_url.into(),
            session_token,
        }
    }

    /// `http://localhost:{PARAMETERS_SECRETS_EXTENSION_HTTP_PORT}` with the
    /// token from `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Self {
        let port = env_or(SECRETS_EXTENSION_PORT_ENV, "2773");
        Self::new(
            format!("http://localhost:{}", port),
            std::env::var(AWS_SESSION_TOKEN_ENV).ok(),
        )
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/secretsmanager/get?secretId={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(name)
        )
    }
}

#[async_trait]
impl SecretStore for ExtensionSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, InvocationError> {
        let mut request = self.client.get(self.endpoint(name));
        if let Some(token) = &self.session_token {
            request = request.header(SECRETS_TOKEN_HEADER, token);
        }

        let resp = request.send().await?.error_for_status()?;
        let body: ExtensionResponse = resp.json().await?;
        body.secret_string.ok_or_else(|| InvocationError::SecretUnavailable {
            name: name.to_string(),
            reason: "response has no SecretString".to_string(),
        })
    }
}

/// In-memory secrets, for tests and local runs.
#[derive(Clone, Debug, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, InvocationError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| InvocationError::SecretUnavailable {
                name: name.to_string(),
                reason: "not found".to_string(),
            })
    }
}
