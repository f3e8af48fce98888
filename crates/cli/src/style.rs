//! Styling helpers for the conflict report.

use console::Style;

/// Success line: green checkmark prefix.
pub fn success(msg: &str) -> String {
    format!("{} {msg}", Style::new().green().apply_to("✓"))
}

/// Error line: red cross prefix.
pub fn error(msg: &str) -> String {
    format!("{} {msg}", Style::new().red().apply_to("✗"))
}

/// Warning line: yellow warning sign prefix.
pub fn warn(msg: &str) -> String {
    format!("{} {msg}", Style::new().yellow().apply_to("⚠"))
}

/// Section header: bold.
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// De-emphasized text (SHAs, hints).
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// The branch being merged (blue, bold).
pub fn source_ref(name: &str) -> String {
    Style::new().blue().bold().apply_to(name).to_string()
}

/// The branch being merged into (green, bold).
pub fn target_ref(name: &str) -> String {
    Style::new().green().bold().apply_to(name).to_string()
}
