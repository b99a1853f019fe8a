//! Environment variable names read by this crate, and classification of
//! the deployment environment from them.
//!
//! Classification is a pure function over candidate values; only
//! [`detect`] touches the process environment.

use serde::Serialize;
use std::fmt;

/// Explicit deployment environment designator. Highest priority signal.
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";

/// Generic environment designator.
pub const ENV_ENV: &str = "ENV";

/// Deployment stage designator.
pub const STAGE_ENV: &str = "STAGE";

/// Serverless function name, inspected for platform-specific substrings.
pub const AWS_LAMBDA_FUNCTION_NAME_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Logging level for loggers built with `LoggerConfig::from_env`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// When truthy, structured call fields are appended to log lines.
pub const LOG_INCLUDE_FIELDS_ENV: &str = "LOG_INCLUDE_FIELDS";

/// Name of the secret holding credentials and endpoint URLs.
pub const SECRET_NAME_ENV: &str = "SECRET_NAME";

/// Port of the Parameters and Secrets Lambda extension.
pub const SECRETS_EXTENSION_PORT_ENV: &str = "PARAMETERS_SECRETS_EXTENSION_HTTP_PORT";

/// Session token forwarded to the secrets extension.
pub const AWS_SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

/// Signals consulted by [`detect`], in priority order.
pub const ENVIRONMENT_SIGNALS: [&str; 4] = [
    ENVIRONMENT_ENV,
    ENV_ENV,
    STAGE_ENV,
    AWS_LAMBDA_FUNCTION_NAME_ENV,
];

/// Substring identifying a serverless function name among the signals.
const PLATFORM_MARKER: &str = "lambda";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable as a boolean flag (`1`, `true`, `yes`, `on`).
pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Deployment environment stamped on every log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Hotfixes,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Hotfixes => "hotfixes",
            Environment::Production => "production",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "development" => Some(Environment::Development),
            "staging" | "stage" => Some(Environment::Staging),
            "hotfixes" => Some(Environment::Hotfixes),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }

    fn from_function_name(lower: &str) -> Self {
        if lower.contains("prod") || lower.contains("production") {
            Environment::Production
        } else if lower.contains("staging") || lower.contains("stage") {
            Environment::Staging
        } else if lower.contains("hotfix") {
            Environment::Hotfixes
        } else {
            Environment::Development
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the environment from candidate signal values in priority order.
///
/// The first non-empty candidate decides. Values that look like a function
/// name (they contain `lambda`) are matched by substring; anything else must
/// name an environment exactly, ignoring case and surrounding whitespace.
/// Unrecognized values fall back to [`Environment::Development`].
pub fn classify<I, S>(candidates: I) -> Environment
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let Some(value) = candidates
        .into_iter()
        .flatten()
        .find(|v| !v.as_ref().is_empty())
    else {
        return Environment::Development;
    };

    let lower = value.as_ref().to_lowercase();
    if lower.contains(PLATFORM_MARKER) {
        return Environment::from_function_name(&lower);
    }

    // Unmapped names silently become development; a typo in ENVIRONMENT
    // will not be reported.
    Environment::from_name(lower.trim()).unwrap_or_default()
}

/// Classify the environment of the current process from
/// [`ENVIRONMENT_SIGNALS`].
pub fn detect() -> Environment {
    classify(ENVIRONMENT_SIGNALS.iter().map(|key| std::env::var(key).ok()))
}
