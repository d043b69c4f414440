//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{BackendError, ConsoleError};

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ConsoleError) -> String {
    match e {
        ConsoleError::Backend(BackendError::Unauthorized(_)) => format!(
            "{}\nSet backend.token in the config file or COLLAB_CONSOLE__BACKEND__TOKEN.",
            e
        ),
        ConsoleError::Backend(BackendError::Transport(_)) => format!(
            "{}\nCheck that the server is reachable at the configured base_url.",
            e
        ),
        _ => e.to_string(),
    }
}
