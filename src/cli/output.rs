//! Console output helpers

use crate::core::ProgramSummary;
pub use console::style;

pub const INFO: &str = "ℹ";
pub const CHECK: &str = "✔";
pub const CROSS: &str = "✘";
pub const WARN: &str = "⚠";

/// Format one program summary line for listings
pub fn format_program_summary(summary: &ProgramSummary) -> String {
    let description = summary
        .description
        .as_deref()
        .map(|d| format!(" - {}", style(d).dim()))
        .unwrap_or_default();
    format!(
        "{} (v{}){}",
        style(&summary.name).bold(),
        style(&summary.version).cyan(),
        description
    )
}

/// Format an assistant message for the chat loop
pub fn format_assistant_message(message: &str) -> String {
    format!("{} {}", style("assistant>").green().bold(), message)
}
