//! CLI presentation: text and json formatters per command family.

mod context;
mod events;
mod run;

use owo_colors::OwoColorize;

pub use context::{format_context_json, format_context_text};
pub use events::format_events_table;
pub use run::{format_run_status, format_status_line};

pub(crate) fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}
