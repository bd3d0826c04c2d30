//! Capability contracts, the canonical description of one operation each.
//!
//! A contract document (`contract.v1.json`) declares a capability's id, its
//! input and output JSON Schemas, its documented error codes, and its side
//! effects. Contracts are the single source of truth from which every
//! protocol-specific artifact (tool descriptor, skill stub, registration)
//! is generated, and the dispatcher validates every call against them.

mod store;

pub use store::{CompiledSchemas, ContractStore, CONTRACT_FILE_NAME};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A documented failure code. Informational only: the dispatcher never
/// enforces that a capability fails with a declared code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSpec {
    /// Machine-readable error code (e.g. `dependency_error`).
    pub code: String,
    /// Human-readable description of the failure mode.
    pub description: String,
}

/// Canonical, versioned description of one capability.
///
/// The `name` field is the capability id: globally unique, namespaced as
/// `domain.action`, and immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Capability id (`domain.action`).
    #[serde(default)]
    pub name: String,

    /// Human-readable summary.
    #[serde(default)]
    pub description: String,

    /// JSON Schema describing accepted payloads.
    #[serde(default)]
    pub input_schema: Value,

    /// JSON Schema describing produced payloads.
    #[serde(default)]
    pub output_schema: Value,

    /// Documented failure codes, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorSpec>,

    /// Free-text description of externally visible effects.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub side_effects: String,
}

/// Errors produced while loading or registering contracts.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The document is not valid JSON or does not match the contract shape.
    #[error("malformed contract document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document has no (or an empty) `name` field.
    #[error("contract missing name")]
    MissingName,

    /// One of the schemas is absent or empty.
    #[error("contract {id} missing {which} schema")]
    MissingSchema { id: String, which: &'static str },

    /// A schema did not compile into a validator.
    #[error("contract {id}: {which} schema failed to compile: {reason}")]
    SchemaCompile {
        id: String,
        which: &'static str,
        reason: String,
    },

    /// A contract with the same id is already registered.
    #[error("duplicate contract id: {0}")]
    Duplicate(String),

    /// Filesystem error while scanning plugin locations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A schema counts as present when it would validate something: an object
/// with at least one keyword, or the boolean schema `true`.
fn schema_present(schema: &Value) -> bool {
    match schema {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

impl Contract {
    /// Parse a contract from a JSON document, rejecting documents without a
    /// name or without both schemas.
    pub fn from_json(text: &str) -> Result<Self, ContractError> {
        let contract: Contract = serde_json::from_str(text)?;
        if contract.name.trim().is_empty() {
            return Err(ContractError::MissingName);
        }
        if !schema_present(&contract.input_schema) {
            return Err(ContractError::MissingSchema {
                id: contract.name,
                which: "input",
            });
        }
        if !schema_present(&contract.output_schema) {
            return Err(ContractError::MissingSchema {
                id: contract.name,
                which: "output",
            });
        }
        Ok(contract)
    }

    /// Whether both schemas are present. Contracts loaded through
    /// [`Contract::from_json`] always satisfy this.
    pub fn is_valid(&self) -> bool {
        schema_present(&self.input_schema) && schema_present(&self.output_schema)
    }

    /// The domain prefix of the id (e.g. `text` from `text.normalize_markdown`).
    pub fn domain(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }

    /// The action part of the id (e.g. `normalize_markdown`).
    pub fn action(&self) -> &str {
        self.name.split_once('.').map_or(self.name.as_str(), |(_, a)| a)
    }
}
