//! `text.normalize_markdown`: pure Markdown text normalization.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::registry::{Capability, CapabilityError, ResolutionError};

pub(crate) fn construct() -> Result<Arc<dyn Capability>, ResolutionError> {
    Ok(Arc::new(NormalizeMarkdown))
}

#[derive(Debug, Deserialize)]
struct Input {
    text: String,
    #[serde(default)]
    options: Options,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Options {
    trim_trailing_whitespace: bool,
    ensure_final_newline: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            trim_trailing_whitespace: true,
            ensure_final_newline: true,
        }
    }
}

/// Split on `\n`, `\r\n`, and lone `\r`. Unlike `str::lines`, a bare
/// carriage return is a line break here, so rejoining with `\n` also
/// normalizes legacy line endings.
fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Normalizes Markdown text: trims trailing whitespace per line and
/// guarantees a final newline. Reports which normalizations actually
/// changed the text.
pub struct NormalizeMarkdown;

impl Capability for NormalizeMarkdown {
    fn id(&self) -> &str {
        "text.normalize_markdown"
    }

    fn invoke(&self, payload: Value) -> Result<Value, CapabilityError> {
        let input: Input = serde_json::from_value(payload)
            .map_err(|e| CapabilityError::new("invalid_arguments", e.to_string()))?;

        let mut changes: Vec<&str> = Vec::new();
        let mut normalized = input.text;

        if input.options.trim_trailing_whitespace {
            let lines: Vec<&str> = split_lines(&normalized);
            let trimmed: Vec<&str> = lines.iter().map(|line| line.trim_end()).collect();
            let changed = trimmed != lines;
            let joined = trimmed.join("\n");
            if changed {
                changes.push("trim_trailing_whitespace");
            }
            normalized = joined;
        }

        if input.options.ensure_final_newline {
            // Empty input becomes a single newline to satisfy the rule.
            if normalized.is_empty() || !normalized.ends_with('\n') {
                normalized.push('\n');
                changes.push("ensure_final_newline");
            }
        }

        Ok(json!({"text": normalized, "changes": changes}))
    }
}
