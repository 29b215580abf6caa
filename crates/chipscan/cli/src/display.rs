//! Terminal output helpers

use colored::Colorize;
use chipscan_core::{Protection, ScannedTag};

/// Format a success message
pub(crate) fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub(crate) fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format a key-value section
pub(crate) fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());
    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }
    result
}

/// Summarise a scanned tag
pub(crate) fn tag_summary(tag: &ScannedTag) -> String {
    let mut items = vec![("UID", tag.uid.to_string())];
    match &tag.payload {
        Some(payload) => {
            let protection = match payload.protection {
                Protection::Verified => "verified".green().to_string(),
                Protection::Unprotected => "unprotected".yellow().to_string(),
            };
            items.push(("Payload", printable(&payload.data)));
            items.push(("Protection", protection));
        }
        None => items.push(("Payload", "none".dimmed().to_string())),
    }
    key_value_box("Tag", items)
}

/// Render payload bytes as text when they are printable, hex otherwise
pub(crate) fn printable(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) if !text.chars().any(char::is_control) => format!("{text:?}"),
        _ => hex::encode(data),
    }
}
