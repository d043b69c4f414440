//! Audit-log page rendering.

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

use crate::backend::LogParent;
use crate::types::LogPage;

use super::format_section_heading;

pub fn format_events_table(parent: &LogParent, page: &LogPage, total_pages: u32) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Events for {}", parent))
    ));
    if page.items.is_empty() {
        out.push_str("No events.\n");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Time", "Event", "Executor", "User", "Reason"]);
        for entry in &page.items {
            table.add_row(vec![
                entry
                    .execution_time
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                entry.event_type.clone(),
                entry.executor.clone().unwrap_or_else(|| "-".to_string()),
                entry.user.clone().unwrap_or_else(|| "-".to_string()),
                entry.reason.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        out.push_str(&format!("{}\n", table));
    }
    out.push_str(&format!("\nPage {} of {}", page.page, total_pages));
    out
}
