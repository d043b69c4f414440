//! Configuration System
//!
//! Layered configuration for the console: built-in defaults, the user's
//! global file, an explicit file, then `COLLAB_CONSOLE__SECTION__KEY`
//! environment variables. Validation reports every problem at once.

use crate::error::ConsoleError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub log_cache: LogCacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how to reach the collaboration server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API root, e.g. `http://localhost:8000/api/v1`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

pub(crate) fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

pub(crate) fn default_connect_timeout_secs() -> u64 {
    10
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between the end of one run fetch and the start of the next
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

pub(crate) fn default_interval_ms() -> u64 {
    2000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogCacheConfig {
    /// Audit-log entries per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

pub(crate) fn default_page_size() -> u32 {
    crate::audit_log::DEFAULT_PAGE_SIZE
}

impl Default for LogCacheConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

pub const MAX_PAGE_SIZE: u32 = 100;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Backend(String),
    Polling(String),
    LogCache(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Backend(msg) => write!(f, "backend: {}", msg),
            ValidationError::Polling(msg) => write!(f, "polling: {}", msg),
            ValidationError::LogCache(msg) => write!(f, "log_cache: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl BackendConfig {
    fn validate(&self, errors: &mut Vec<ValidationError>) {
        match reqwest::Url::parse(&self.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::Backend(format!(
                "base_url scheme '{}' is not http or https",
                url.scheme()
            ))),
            Err(e) => errors.push(ValidationError::Backend(format!(
                "base_url '{}' is not a valid URL: {}",
                self.base_url, e
            ))),
        }
        if self.connect_timeout_secs == 0 {
            errors.push(ValidationError::Backend(
                "connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            errors.push(ValidationError::Backend(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
    }
}

impl ConsoleConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        self.backend.validate(&mut errors);

        if self.polling.interval_ms == 0 {
            errors.push(ValidationError::Polling(
                "interval_ms must be greater than zero".to_string(),
            ));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.log_cache.page_size) {
            errors.push(ValidationError::LogCache(format!(
                "page_size {} is outside 1..={}",
                self.log_cache.page_size, MAX_PAGE_SIZE
            )));
        }

        if let Err(e) = crate::logging::validate(&self.logging) {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one error.
    pub fn validated(self) -> Result<Self, ConsoleError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ConsoleError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }

    /// Render as TOML with the token masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConsoleError> {
        let mut shown = self.clone();
        if shown.backend.token.is_some() {
            shown.backend.token = Some("********".to_string());
        }
        toml::to_string_pretty(&shown)
            .map_err(|e| ConsoleError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
