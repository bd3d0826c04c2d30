//! Tool-call descriptor generation.
//!
//! Produces one `{"type": "function", ...}` descriptor per contract, the
//! shape tool-calling LLM APIs consume. The descriptor's `parameters` is
//! the contract's input schema minus the `$schema` metadata key, passed
//! through otherwise unmodified.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::contract::{Contract, ContractStore};

use super::strip_schema_meta;

/// Build the tool-call descriptor for one contract.
pub fn tool_descriptor(contract: &Contract) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": contract.name,
            "description": contract.description,
            "parameters": strip_schema_meta(&contract.input_schema),
        },
    })
}

/// Canonical file form of a descriptor: two-space-indented JSON with a
/// trailing newline. Keys are emitted sorted, so regeneration is
/// byte-identical for the same contract.
pub fn render_descriptor(contract: &Contract) -> String {
    let mut out = serde_json::to_string_pretty(&tool_descriptor(contract))
        .unwrap_or_else(|_| "{}".to_string());
    out.push('\n');
    out
}

/// Write one `<id>.json` descriptor per contract into `out_dir`. Returns
/// the written paths, in id order.
pub fn write_descriptors(store: &ContractStore, out_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();
    for contract in store.contracts() {
        let path = out_dir.join(format!("{}.json", contract.name));
        fs::write(&path, render_descriptor(contract))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract() -> Contract {
        Contract::from_json(
            &json!({
                "name": "text.normalize_markdown",
                "description": "Normalize Markdown text.",
                "input_schema": {
                    "$schema": "http://json-schema.org/draft-07/schema#",
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"],
                },
                "output_schema": {"type": "object"},
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_descriptor_shape() {
        let descriptor = tool_descriptor(&contract());
        assert_eq!(descriptor["type"], "function");
        assert_eq!(descriptor["function"]["name"], "text.normalize_markdown");
        assert_eq!(
            descriptor["function"]["description"],
            "Normalize Markdown text."
        );
        // `$schema` is stripped; the rest of the schema passes through.
        assert!(descriptor["function"]["parameters"]
            .get("$schema")
            .is_none());
        assert_eq!(
            descriptor["function"]["parameters"]["required"],
            json!(["text"])
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let first = render_descriptor(&contract());
        let second = render_descriptor(&contract());
        assert_eq!(first, second);
        assert!(first.ends_with('\n'));
    }

    #[test]
    fn test_write_descriptors() {
        let mut store = ContractStore::new();
        store.insert(contract()).unwrap();
        let tmp = tempfile::TempDir::new().unwrap();

        let written = write_descriptors(&store, tmp.path()).unwrap();
        assert_eq!(written.len(), 1);
        let body = std::fs::read_to_string(tmp.path().join("text.normalize_markdown.json")).unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["function"]["name"], "text.normalize_markdown");

        // Regeneration leaves the file byte-identical.
        let again = write_descriptors(&store, tmp.path()).unwrap();
        assert_eq!(written, again);
        assert_eq!(
            body,
            std::fs::read_to_string(tmp.path().join("text.normalize_markdown.json")).unwrap()
        );
    }
}
