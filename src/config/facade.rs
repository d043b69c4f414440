//! Loads `ConsoleConfig` from every configured source.

use config::Map;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::merge::merge_policy;
use super::sources::{environment, explicit_file, global_file};
use super::ConsoleConfig;
use crate::error::ConsoleError;

/// Builder over the configuration sources, lowest precedence first:
/// defaults, global file, explicit file, environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_file: Option<PathBuf>,
    explicit_file: Option<PathBuf>,
    env_vars: Option<Map<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            global_file: global_file::global_config_path(),
            explicit_file: None,
            env_vars: None,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `path` as the global file instead of the per-user location.
    pub fn with_global_file(mut self, path: Option<PathBuf>) -> Self {
        self.global_file = path;
        self
    }

    pub fn with_explicit_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }

    /// Read overrides from `vars` instead of the process environment.
    pub fn with_env_vars(mut self, vars: Map<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Merge every source and validate the result.
    pub fn load(&self) -> Result<ConsoleConfig, ConsoleError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = global_file::add_to_builder(builder, self.global_file.as_deref())?;
        if let Some(path) = &self.explicit_file {
            debug!(config_path = %path.display(), "Loading explicit configuration file");
            builder = explicit_file::add_to_builder(builder, path)?;
        }
        builder = environment::add_to_builder(builder, self.env_vars.clone());

        let config: ConsoleConfig = builder.build()?.try_deserialize()?;
        config.validated()
    }

    /// Load a single file over the defaults, without global or environment sources.
    pub fn load_from_file(path: &Path) -> Result<ConsoleConfig, ConsoleError> {
        Self::new()
            .with_global_file(None)
            .with_explicit_file(Some(path.to_path_buf()))
            .with_env_vars(Map::new())
            .load()
    }
}
