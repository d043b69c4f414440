//! Environment source: COLLAB_CONSOLE__SECTION__KEY, e.g.
//! `COLLAB_CONSOLE__POLLING__INTERVAL_MS=500`.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, Map};

pub const ENV_PREFIX: &str = "COLLAB_CONSOLE";

/// Add environment overrides. `vars` replaces the process environment when given.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    vars: Option<Map<String, String>>,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(vars),
    )
}
