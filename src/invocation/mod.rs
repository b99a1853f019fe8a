//! Serverless handler: fetch credentials from a secret store, trade them
//! for a bearer token, call the protected API once (with retries) and wrap
//! the outcome in a JSON envelope.
//!
//! Every invocation gets a fresh trace id that is logged on each record and
//! sent as `X-Request-ID` on outbound requests, and is cleared again before
//! the handler returns.

pub mod client;
pub mod secrets;

use crate::env::SECRET_NAME_ENV;
use crate::logger::Logger;
use crate::record::to_json_line;
use crate::trace::setup_trace_id;
use client::{ApiClient, RetryPolicy, DEFAULT_USER_AGENT};
use secrets::{Credentials, SecretStore};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Failures of a single invocation. All of them end up in a 500 envelope.
#[derive(thiserror::Error, Debug)]
pub enum InvocationError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("secret {name:?} is unavailable: {reason}")]
    SecretUnavailable { name: String, reason: String },

    #[error("secret is not valid credentials JSON: {0}")]
    SecretFormat(#[source] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("response body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("No token found in auth response.")]
    MissingToken,
}

impl InvocationError {
    /// Whether the protected API call should be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InvocationError::Http(_) | InvocationError::InvalidJson(_))
    }
}

/// Handler settings.
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// Secret holding [`Credentials`]; absence fails every invocation.
    pub secret_name: Option<String>,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            secret_name: None,
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HandlerConfig {
    /// Secret name from `SECRET_NAME`; everything else at defaults.
    pub fn from_env() -> Self {
        Self {
            secret_name: std::env::var(SECRET_NAME_ENV).ok().filter(|s| !s.is_empty()),
            ..Self::default()
        }
    }
}

/// Envelope returned to the serverless runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON document serialized as a string.
    pub body: String,
}

#[derive(Serialize)]
struct SuccessBody<'a> {
    message: &'static str,
    data: Value,
    #[serde(rename = "traceId")]
    trace_id: &'a str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'static str,
    error: String,
    #[serde(rename = "traceId")]
    trace_id: &'a str,
}

fn respond<T: Serialize>(status_code: u16, body: &T) -> InvocationResponse {
    InvocationResponse {
        status_code,
        body: to_json_line(body).unwrap_or_else(|_| "{}".to_string()),
    }
}

/// Runs invocations against one secret store with one logger.
pub struct InvocationDriver {
    logger: Arc<Logger>,
    secrets: Arc<dyn SecretStore>,
    client: ApiClient,
    secret_name: Option<String>,
}

impl InvocationDriver {
    pub fn new(logger: Arc<Logger>, secrets: Arc<dyn SecretStore>, config: HandlerConfig) -> Self {
        let client = ApiClient::new(Arc::clone(&logger), config.user_agent, config.retry);
        InvocationDriver {
            logger,
            secrets,
            client,
            secret_name: config.secret_name,
        }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// Handle one invocation. Never fails: errors are logged with
    /// exception details and reported as a 500 envelope.
    pub async fn handle(&self) -> InvocationResponse {
        let trace_id = setup_trace_id(&self.logger);

        let response = match self.run(&trace_id).await {
            Ok(data) => respond(
                200,
                &SuccessBody {
                    message: "Success",
                    data,
                    trace_id: &trace_id,
                },
            ),
            Err(err) => {
                crate::exception!(self.logger, Some(&err), "Lambda execution failed");
                respond(
                    500,
                    &ErrorBody {
                        message: "Error",
                        error: err.to_string(),
                        trace_id: &trace_id,
                    },
                )
            }
        };

        self.logger.clear_trace_id();
        response
    }

    async fn run(&self, trace_id: &str) -> Result<Value, InvocationError> {
        crate::info!(self.logger, "Lambda execution started");

        let name = self
            .secret_name
            .as_deref()
            .ok_or(InvocationError::MissingEnv(SECRET_NAME_ENV))?;
        let secret = self.secrets.get_secret(name).await?;
        let creds = Credentials::parse(&secret)?;
        crate::info!(self.logger, "Retrieved credentials for user: {}", creds.username);

        let token = self.client.get_token(&creds, trace_id).await?;
        crate::info!(self.logger, "Token retrieved successfully");

        let data = self
            .client
            .call_base_api(&token, trace_id, &creds.protected_api_url)
            .await?;
        crate::info!(self.logger, "Base Api call succeeded");

        Ok(data)
    }
}
