//! Rendering of tool results for the terminal.
//!
//! MCP tool results carry a `content` array of typed blocks; text blocks are
//! printed as-is, anything else falls back to pretty JSON.

use serde_json::Value;

/// Render a `tools/call` result into displayable text.
pub fn render_result(result: &Value) -> String {
    match result.get("content") {
        Some(Value::Array(items)) => {
            let mut out = Vec::new();
            for item in items {
                match item.get("type").and_then(|t| t.as_str()) {
                    Some("text") => {
                        if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                            out.push(text.to_string());
                        }
                    }
                    _ => out.push(pretty(item)),
                }
            }
            if out.is_empty() {
                "No results returned".to_string()
            } else {
                out.join("\n")
            }
        }
        Some(Value::String(text)) => text.clone(),
        Some(other) => pretty(other),
        None => format!("No results returned\nFull response: {}", pretty(result)),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
