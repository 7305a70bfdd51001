pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use self::validation::validate_config;

/// Model sent on the wire when the custom backend config names none.
pub const DEFAULT_WIRE_MODEL: &str = "gpt-3.5-turbo";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// What to do with tool declarations once the backend is known not to
/// support native tool calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Describe the tools in the system prompt and parse JSON replies.
    #[default]
    Text,
    /// Drop tool declarations.
    Disabled,
}

/// Connection settings for an OpenAI-compatible chat completions endpoint.
///
/// Owned by the surrounding configuration layer; the generator only ever
/// reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomBackendConfig {
    /// Full URL of the chat completions endpoint (not a base URL).
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// `None` means unknown: tools are sent natively until the backend
    /// rejects them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_tools: Option<bool>,
    #[serde(default)]
    pub fallback_mode: FallbackMode,
}

impl CustomBackendConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
            supports_tools: None,
            fallback_mode: FallbackMode::Text,
        }
    }

    /// The model name sent in the wire request body.
    #[must_use]
    pub fn wire_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_WIRE_MODEL)
    }

    /// Blank optional strings collected from user input mean "not set".
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.endpoint = self.endpoint.trim().to_string();
        self.api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self.model = self
            .model
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty());
        self
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Extra headers sent on every request.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    180
}
fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            default_headers: BTreeMap::new(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How many times a call may be re-issued with tools disabled after a
    /// tool-incompatibility failure.
    #[serde(default = "default_max_fallback_attempts")]
    pub max_fallback_attempts: u32,
}

fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_max_fallback_attempts() -> u32 {
    1
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            max_fallback_attempts: default_max_fallback_attempts(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub custom_api: CustomBackendConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = serde_yaml::from_str(contents)?;
    config.custom_api = config.custom_api.normalized();
    validate_config(&config)?;
    Ok(config)
}
