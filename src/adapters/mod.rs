//! Adapter generators: protocol-specific artifacts derived from contracts.
//!
//! Each generator is a pure, deterministic transform over the contract
//! store: tool-calling function descriptors (`toolgen`), skill
//! documentation stubs (`skillgen`), and direct protocol registrations
//! (`registration`). Generators read contracts and wire calls back into the
//! dispatcher; they never reach into its internals. Regenerating from the
//! same contract produces byte-identical output, so diffs detect contract
//! changes.

pub mod registration;
pub mod skillgen;
pub mod toolgen;

use serde_json::Value;

/// Copy of a schema with the schema-metadata key removed. Host protocols
/// expect plain parameter objects without `$schema`.
pub(crate) fn strip_schema_meta(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut cleaned = map.clone();
            cleaned.remove("$schema");
            Value::Object(cleaned)
        }
        other => other.clone(),
    }
}
