//! Resolved context rendering.

use crate::context::ResolvedContext;
use crate::error::ConsoleError;

use super::format_section_heading;
use super::run::format_run_status;

pub fn format_context_text(context: &ResolvedContext, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Context")));
    if context.is_empty() {
        out.push_str("  (nothing resolved)\n");
        return out;
    }
    if let Some(project) = &context.project {
        out.push_str(&format!("  Project:  {} ({})\n", project.name, project.slug));
    }
    if let Some(model) = &context.model {
        let tool = match (&model.tool, &model.version) {
            (Some(tool), Some(version)) => format!(", {} {}", tool, version),
            (Some(tool), None) => format!(", {}", tool),
            _ => String::new(),
        };
        out.push_str(&format!("  Model:    {} ({}{})\n", model.name, model.slug, tool));
    }
    if let Some(pipeline) = &context.pipeline {
        out.push_str(&format!(
            "  Pipeline: #{}{}\n",
            pipeline.id,
            if pipeline.run_nightly { " (nightly)" } else { "" }
        ));
    }
    if let Some(run) = &context.run {
        out.push_str(&format!(
            "  Run:      #{} {}\n",
            run.id,
            format_run_status(run.status, color)
        ));
    }
    out
}

pub fn format_context_json(context: &ResolvedContext) -> Result<String, ConsoleError> {
    serde_json::to_string_pretty(context)
        .map_err(|e| ConsoleError::ConfigError(format!("Failed to render context: {}", e)))
}
