//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Default deadline for the AI call, in milliseconds.
pub const DEFAULT_AI_TIMEOUT_MS: u64 = 15_000;

/// Default token budget stored with new AI settings.
pub const DEFAULT_AI_MAX_TOKENS: u32 = 80;

/// Token budget used when the stored value is zero.
const FALLBACK_AI_MAX_TOKENS: u32 = 50;

/// AI classifier settings, handed to the classifier as a read snapshot.
///
/// Field names match the stored settings document (`timeout` is in
/// milliseconds). Missing settings mean AI is disabled.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Global switch for every AI node.
    pub enabled: bool,
    /// Chat-completions URL (OpenAI-compatible).
    pub endpoint: String,
    /// Bearer token sent with each request.
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: SecretString,
    /// Model name passed through to the endpoint.
    pub model: String,
    /// Per-call deadline in milliseconds. Zero means the default.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    /// Completion token budget. Zero means the fallback budget.
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: SecretString::from(String::new()),
            model: String::new(),
            timeout_ms: DEFAULT_AI_TIMEOUT_MS,
            max_tokens: DEFAULT_AI_MAX_TOKENS,
        }
    }
}

impl AiConfig {
    /// Disabled settings, used when nothing is stored.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build settings from `MAIL_ROUTER_AI_*` environment variables.
    ///
    /// Unset variables keep their defaults; AI stays off unless
    /// `MAIL_ROUTER_AI_ENABLED` is truthy.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("MAIL_ROUTER_AI_ENABLED") {
            config.enabled = parse_bool("MAIL_ROUTER_AI_ENABLED", &raw)?;
        }
        if let Some(endpoint) = lookup("MAIL_ROUTER_AI_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(key) = lookup("MAIL_ROUTER_AI_API_KEY") {
            config.api_key = SecretString::from(key);
        }
        if let Some(model) = lookup("MAIL_ROUTER_AI_MODEL") {
            config.model = model;
        }
        if let Some(raw) = lookup("MAIL_ROUTER_AI_TIMEOUT_MS") {
            config.timeout_ms = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "MAIL_ROUTER_AI_TIMEOUT_MS".into(),
                message: format!("{e}"),
            })?;
        }
        if let Some(raw) = lookup("MAIL_ROUTER_AI_MAX_TOKENS") {
            config.max_tokens = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "MAIL_ROUTER_AI_MAX_TOKENS".into(),
                message: format!("{e}"),
            })?;
        }

        Ok(config)
    }

    /// Parse stored settings JSON. `None` yields disabled settings.
    pub fn from_stored(document: Option<&str>) -> Result<Self, ConfigError> {
        match document {
            None => Ok(Self::disabled()),
            Some(raw) => {
                serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))
            }
        }
    }

    /// Deadline for one AI call.
    pub fn timeout(&self) -> Duration {
        if self.timeout_ms == 0 {
            Duration::from_millis(DEFAULT_AI_TIMEOUT_MS)
        } else {
            Duration::from_millis(self.timeout_ms)
        }
    }

    /// Token budget for one AI call.
    pub fn effective_max_tokens(&self) -> u32 {
        if self.max_tokens == 0 {
            FALLBACK_AI_MAX_TOKENS
        } else {
            self.max_tokens
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got `{other}`"),
        }),
    }
}
