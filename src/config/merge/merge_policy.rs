//! Merge rules: built-in defaults sit under every other source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

use super::super::{
    default_base_url, default_connect_timeout_secs, default_interval_ms, default_page_size,
    default_request_timeout_secs,
};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("backend.base_url", default_base_url())?
        .set_default("backend.connect_timeout_secs", default_connect_timeout_secs())?
        .set_default("backend.request_timeout_secs", default_request_timeout_secs())?
        .set_default("polling.interval_ms", default_interval_ms())?
        .set_default("log_cache.page_size", u64::from(default_page_size()))
}
