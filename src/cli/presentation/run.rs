//! Run status rendering.

use owo_colors::OwoColorize;

use crate::types::{PipelineRun, RunStatus};

/// Status word, colored by whether the run is still in progress.
pub fn format_run_status(status: RunStatus, color: bool) -> String {
    if !color {
        return status.as_str().to_string();
    }
    match status {
        RunStatus::Success => status.as_str().green().to_string(),
        s if s.is_in_progress() => s.as_str().yellow().to_string(),
        s => s.as_str().red().to_string(),
    }
}

/// One line per observed run snapshot.
pub fn format_status_line(run: &PipelineRun, color: bool) -> String {
    let mut line = format!(
        "run {} {} (triggered {}",
        run.id,
        format_run_status(run.status, color),
        run.trigger_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(triggerer) = &run.triggerer {
        line.push_str(&format!(" by {}", triggerer));
    }
    line.push(')');
    line
}
