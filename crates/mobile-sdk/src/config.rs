//! SDK configuration — base URLs, request timeout and log gating.
//!
//! Loaded from environment variables with the prefix `CAMPAIGN_SDK__`,
//! falling back to per-field defaults.

use serde::{Deserialize, Serialize};
use url::Url;

use campaign_core::{SdkError, SdkResult};

use crate::logging::LogLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Origin of the placement web UI.
    #[serde(default = "default_ui_base_url")]
    pub ui_base_url: String,
    /// Origin of the campaign REST API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub enable_sdk_logging: bool,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_ui_base_url() -> String {
    "https://app.withflock.com".to_string()
}
fn default_api_base_url() -> String {
    "https://api.withflock.com".to_string()
}
fn default_request_timeout_seconds() -> u64 {
    30
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            ui_base_url: default_ui_base_url(),
            api_base_url: default_api_base_url(),
            request_timeout_seconds: default_request_timeout_seconds(),
            enable_sdk_logging: false,
            log_level: LogLevel::default(),
        }
    }
}

impl SdkConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CAMPAIGN_SDK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Check both base URLs parse as absolute http(s) URLs.
    pub fn validate(&self) -> SdkResult<()> {
        validate_base_url("ui_base_url", &self.ui_base_url)?;
        validate_base_url("api_base_url", &self.api_base_url)?;
        if self.request_timeout_seconds == 0 {
            return Err(SdkError::Configuration(
                "request_timeout_seconds must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_base_url(field: &str, value: &str) -> SdkResult<()> {
    let url = Url::parse(value)
        .map_err(|e| SdkError::Configuration(format!("{field} '{value}' is invalid: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(SdkError::Configuration(format!(
            "{field} must use http or https, got '{scheme}'"
        ))),
    }
}
