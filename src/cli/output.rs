//! Human and JSON rendering for command results.

use serde::Serialize;

/// A command result that can be shown to an operator or piped to a tool.
pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    /// Defaults to the serde form; override to add derived fields.
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Render without printing.
pub fn render<T: CommandOutput>(result: &T, json_mode: bool) -> String {
    if !json_mode {
        return result.to_human();
    }
    serde_json::to_string_pretty(&result.to_json()).unwrap_or_else(|_| "null".to_string())
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    println!("{}", render(result, json_mode));
}

/// Shorten to `max_len` characters, ending in "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    kept.push_str("...");
    kept
}
