//! Global config file source: $XDG_CONFIG_HOME/collab-console/config.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path to the global config file, if a home directory is known.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "collab-console")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the global config file to the builder if it exists.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    path: Option<&Path>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = path else {
        return Ok(builder);
    };
    if path.exists() {
        builder = builder.add_source(File::from(path).required(false));
    } else {
        debug!(config_path = %path.display(), "No global configuration file");
    }
    Ok(builder)
}
