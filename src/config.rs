//! Connector configuration: explicit construction, JSON file loading, and
//! environment loading. Immutable once a [`crate::Client`] is built from it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::retry::RetryPolicy;
use crate::wire::SafetySetting;
use crate::DEFAULT_MODEL;

const BLOCK_MEDIUM_AND_ABOVE: &str = "BLOCK_MEDIUM_AND_ABOVE";

const DEFAULT_HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Connector configuration. One config backs exactly one client for its
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Attempt budget for single-shot generation (including the first try).
    pub retry_attempts: u32,
    /// Base backoff delay in seconds; doubles per failed attempt.
    pub retry_delay: f64,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Harm-category thresholds; `None` selects the default block-medium set.
    pub safety_settings: Option<Vec<SafetySetting>>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_name: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout: 30,
            retry_attempts: 3,
            retry_delay: 1.0,
            log_level: "info".to_string(),
            log_file: None,
            safety_settings: None,
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file. Unknown fields are rejected.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        let config: GeminiConfig = serde_json::from_str(&raw).map_err(|err| {
            Error::Config(format!("failed to parse {}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables. `GEMINI_API_KEY` is
    /// required; the rest override defaults when present.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("GEMINI_API_KEY environment variable not set".to_string())
            })?;

        let mut config = GeminiConfig::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model_name = model;
        }
        if let Some(temperature) = parse_env("GEMINI_TEMPERATURE")? {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = parse_env("GEMINI_MAX_TOKENS")? {
            config.max_tokens = max_tokens;
        }
        if let Some(timeout) = parse_env("GEMINI_TIMEOUT")? {
            config.timeout = timeout;
        }
        if let Ok(log_level) = std::env::var("GEMINI_LOG_LEVEL") {
            config.log_level = log_level;
        }
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("api key is required".to_string()));
        }
        if self.model_name.trim().is_empty() {
            return Err(Error::Config("model name is required".to_string()));
        }
        if self.retry_attempts == 0 {
            return Err(Error::Config("retry_attempts must be at least 1".to_string()));
        }
        if self.retry_delay <= 0.0 {
            return Err(Error::Config("retry_delay must be positive".to_string()));
        }
        if self.timeout == 0 {
            return Err(Error::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.retry_delay.max(0.0)),
        }
    }

    /// Configured safety settings, or the default block-medium set for the
    /// four standard harm categories.
    pub(crate) fn effective_safety_settings(&self) -> Vec<SafetySetting> {
        self.safety_settings.clone().unwrap_or_else(|| {
            DEFAULT_HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting::new(*category, BLOCK_MEDIUM_AND_ABOVE))
                .collect()
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| Error::Config(format!("invalid {name}: {err}"))),
        Err(_) => Ok(None),
    }
}
