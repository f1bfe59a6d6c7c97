use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub service_account_email: String,
    /// PEM-encoded RSA key of the service account
    pub private_key: String,
    pub sheet_id: String,
    /// A1 range rows are appended to and read from
    pub sheet_range: String,
    pub token_url: String,
    pub sheets_api_url: String,
    pub http_timeout: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("service_account_email", &self.service_account_email)
            .field("private_key", &"[REDACTED]")
            .field("sheet_id", &self.sheet_id)
            .field("sheet_range", &self.sheet_range)
            .field("token_url", &self.token_url)
            .field("sheets_api_url", &self.sheets_api_url)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "RELAY_BIND_ADDR", "0.0.0.0:4000");

        let service_account_email = required_trimmed(&lookup, "GOOGLE_SERVICE_ACCOUNT_EMAIL")?;
        // Keys pasted into .env files usually carry literal "\n" sequences.
        let private_key = required_trimmed(&lookup, "GOOGLE_PRIVATE_KEY")?
            .replace("\\n", "\n")
            .trim()
            .to_string();
        if !private_key.contains("PRIVATE KEY") {
            return Err(ConfigError::Invalid(
                "GOOGLE_PRIVATE_KEY must be a PEM-encoded private key".to_string(),
            ));
        }
        let sheet_id = required_trimmed(&lookup, "GOOGLE_SHEET_ID")?;
        let sheet_range = value_or_default(&lookup, "GOOGLE_SHEET_RANGE", "Sheet1");

        let token_url = value_or_default(&lookup, "GOOGLE_TOKEN_URL", DEFAULT_TOKEN_URL);
        if !is_http_url(&token_url) {
            return Err(ConfigError::Invalid(
                "GOOGLE_TOKEN_URL must start with http:// or https://".to_string(),
            ));
        }
        let sheets_api_url = trim_trailing(&value_or_default(
            &lookup,
            "GOOGLE_SHEETS_API_URL",
            DEFAULT_SHEETS_API_URL,
        ))
        .to_string();
        if !is_http_url(&sheets_api_url) {
            return Err(ConfigError::Invalid(
                "GOOGLE_SHEETS_API_URL must start with http:// or https://".to_string(),
            ));
        }

        let http_timeout_secs = value_or_default(&lookup, "RELAY_HTTP_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "RELAY_HTTP_TIMEOUT_SECS must be an integer in [1, 120]".to_string(),
                )
            })?;
        if !(1..=120).contains(&http_timeout_secs) {
            return Err(ConfigError::Invalid(
                "RELAY_HTTP_TIMEOUT_SECS must be in [1, 120]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            service_account_email,
            private_key,
            sheet_id,
            sheet_range,
            token_url,
            sheets_api_url,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn trim_trailing(value: &str) -> &str {
    value.trim_end_matches('/')
}
