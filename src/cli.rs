//! CLI domain: parse, route, output, and presentation only.
//! Orchestration lives in the resolver, poller and log cache; routes wire them up.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat, TargetArgs};
pub use presentation::{
    format_context_json, format_context_text, format_events_table, format_run_status,
    format_status_line,
};
pub use route::RunContext;
