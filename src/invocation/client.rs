use super::secrets::Credentials;
use super::InvocationError;
use crate::logger::{LogArgs, Logger};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Header carrying the trace id on outbound requests.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Exponential backoff for the protected API call.
///
/// The wait after attempt `n` is `multiplier * 2^(n-1)` seconds, clamped
/// to `[min_wait, max_wait]`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: f64,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 1.5,
            min_wait: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.multiplier * 2f64.powi(exp);
        let wait = Duration::try_from_secs_f64(secs).unwrap_or(self.max_wait);
        wait.max(self.min_wait).min(self.max_wait)
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
    domain: &'a str,
}

/// HTTP calls made during one invocation.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    user_agent: String,
    retry: RetryPolicy,
    logger: Arc<Logger>,
}

impl ApiClient {
    pub fn new(logger: Arc<Logger>, user_agent: impl Into<String>, retry: RetryPolicy) -> Self {
        ApiClient {
            http: Client::new(),
            user_agent: user_agent.into(),
            retry,
            logger,
        }
    }

    /// Exchange credentials for a bearer token. Not retried.
    pub async fn get_token(&self, creds: &Credentials, trace_id: &str) -> Result<String, InvocationError> {
        let payload = TokenRequest {
            username: &creds.username,
            password: &creds.password,
            domain: &creds.domain,
        };

        let resp = self
            .http
            .post(&creds.auth_api_url)
            .header(REQUEST_ID_HEADER, trace_id)
            .header(USER_AGENT, &self.user_agent)
            .timeout(TOKEN_TIMEOUT)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: Value = resp.json().await?;
        match body.get("token") {
            Some(Value::String(token)) if !token.is_empty() => Ok(token.clone()),
            _ => Err(InvocationError::MissingToken),
        }
    }

    /// Call the protected API, retrying transport errors, error statuses
    /// and undecodable JSON per the [`RetryPolicy`]. The last error is
    /// returned once attempts run out.
    pub async fn call_base_api(&self, token: &str, trace_id: &str, url: &str) -> Result<Value, InvocationError> {
        let mut attempt = 1;
        loop {
            match self.call_once(token, trace_id, url).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let wait = self.retry.wait_for(attempt);
                    self.logger.warning_with(
                        "Base API call failed, retrying",
                        LogArgs::new()
                            .field("attempt", attempt)
                            .field("wait_ms", wait.as_millis() as u64)
                            .field("error", e.to_string()),
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once(&self, token: &str, trace_id: &str, url: &str) -> Result<Value, InvocationError> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, trace_id)
            .header(USER_AGENT, &self.user_agent)
            .timeout(API_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let text = resp.text().await?;

        if is_json && !text.trim().is_empty() {
            serde_json::from_str(&text).map_err(InvocationError::InvalidJson)
        } else {
            self.logger
                .warning(format_args!("Non-JSON or empty response from base API: {}", text));
            Ok(Value::String(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_waits() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for(1), Duration::from_secs(2));
        assert_eq!(policy.wait_for(2), Duration::from_secs(3));
        assert_eq!(policy.wait_for(3), Duration::from_secs(6));
        assert_eq!(policy.wait_for(10), Duration::from_secs(60));
        assert_eq!(policy.wait_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn short_policy_respects_floor() {
        let policy = RetryPolicy {
            max_attempts: 3,
            multiplier: 0.0001,
            min_wait: Duration::from_millis(1),
            max_wait: Duration::from_millis(5),
        };
        assert_eq!(policy.wait_for(1), Duration::from_millis(1));
    }
}
