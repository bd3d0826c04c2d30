//! Dispatcher: validated, envelope-normalized capability invocation.
//!
//! `dispatch(id, payload)` is the single entry point behind every surface
//! (CLI, tool-call, direct registration). It validates the payload against
//! the contract's input schema, resolves and invokes the implementation,
//! validates the result against the output schema, and reduces every
//! failure mode to one uniform envelope. Nothing above the dispatcher ever
//! observes a raised fault.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{ContractError, ContractStore};
use crate::registry::{Binding, CapabilityRegistry};

/// Error half of the dispatch envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error taxonomy tag (`validation_error`, `capability_error`, ...) or a
    /// capability-declared code passed through unchanged.
    #[serde(rename = "type")]
    pub error_type: String,

    /// Human-readable message.
    pub message: String,

    /// Optional structured context (e.g. schema violations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The only on-the-wire output shape: exactly one of `result`/`error` is
/// present, and `result` is absent iff `ok` is false. The constructors are
/// the only way to build one, so the invariant holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the call succeeded.
    pub ok: bool,

    /// Capability output, present iff `ok`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Failure description, present iff `!ok`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    /// Successful call.
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failed call.
    pub fn failure(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                error_type: error_type.into(),
                message: message.into(),
                details: None,
            }),
        }
    }

    /// Failed call with structured details.
    pub fn failure_with_details(
        error_type: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                error_type: error_type.into(),
                message: message.into(),
                details: Some(details),
            }),
        }
    }

    /// Render as the canonical wire form: two-space-indented JSON plus a
    /// trailing newline.
    pub fn to_json_pretty(&self) -> String {
        let mut out = serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string());
        out.push('\n');
        out
    }
}

/// One schema violation, reduced to the wire shape carried in
/// `error.details` for `validation_error` / `output_validation_error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Validator message for this violation.
    pub message: String,
    /// JSON-Pointer into the offending instance. For a missing required
    /// property, the pointer names the absent field.
    pub path: String,
    /// JSON-Pointer into the schema keyword that failed.
    pub schema_path: String,
}

/// Collect **all** violations of `instance` against a compiled schema,
/// sorted by instance path for determinism. `None` when the instance
/// conforms.
fn check(validator: &Validator, instance: &Value) -> Option<Vec<Violation>> {
    if validator.is_valid(instance) {
        return None;
    }
    let mut violations: Vec<Violation> = validator
        .iter_errors(instance)
        .map(|err| {
            let mut path = err.instance_path.to_string();
            // A required-property violation points at the parent object;
            // extend the pointer so `path` names the missing field.
            if let jsonschema::error::ValidationErrorKind::Required { property } = &err.kind {
                if let Some(name) = property.as_str() {
                    path = format!("{path}/{name}");
                }
            }
            Violation {
                message: err.to_string(),
                path,
                schema_path: err.schema_path.to_string(),
            }
        })
        .collect();
    violations.sort_by(|a, b| a.path.cmp(&b.path).then(a.schema_path.cmp(&b.schema_path)));
    Some(violations)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "capability panicked".to_string()
    }
}

/// Stateless, thread-safe dispatch engine over an immutable store and
/// registry. A dispatch call mutates nothing; its envelope is a pure return
/// value.
pub struct Dispatcher {
    store: Arc<ContractStore>,
    registry: Arc<CapabilityRegistry>,
}

impl Dispatcher {
    /// Assemble a dispatcher from an already-discovered store and registry.
    pub fn new(store: Arc<ContractStore>, registry: Arc<CapabilityRegistry>) -> Self {
        Self { store, registry }
    }

    /// Run discovery against a plugin root with the given entry-point table
    /// and assemble the engine in one shot.
    pub fn discover_from(
        contracts_dir: &Path,
        bindings: Vec<Binding>,
    ) -> Result<Self, ContractError> {
        let mut store = ContractStore::new();
        store.load_dir(contracts_dir)?;
        let registry = CapabilityRegistry::discover(&mut store, bindings);
        Ok(Self::new(Arc::new(store), Arc::new(registry)))
    }

    /// The contract store backing this dispatcher.
    pub fn store(&self) -> &ContractStore {
        &self.store
    }

    /// Shared handle to the contract store, for adapter generators.
    pub fn store_arc(&self) -> Arc<ContractStore> {
        Arc::clone(&self.store)
    }

    /// Dispatch a capability call. Synchronous; side-effect-free beyond
    /// invoking the target capability. Every outcome is an envelope.
    pub fn dispatch(&self, id: &str, payload: Value) -> Envelope {
        if !self.registry.contains(id) {
            return Envelope::failure("capability_not_found", format!("unknown capability: {id}"));
        }

        let contract = match self.store.get(id) {
            Some(contract) if contract.is_valid() => contract,
            _ => {
                return Envelope::failure(
                    "contract_invalid",
                    "contract missing input/output schema",
                );
            }
        };
        let Some(schemas) = self.store.schemas(id) else {
            return Envelope::failure(
                "contract_invalid",
                format!("no compiled schemas for capability: {}", contract.name),
            );
        };

        if let Some(violations) = check(&schemas.input, &payload) {
            return Envelope::failure_with_details(
                "validation_error",
                "schema validation failed",
                serde_json::to_value(violations).unwrap_or(Value::Null),
            );
        }

        let capability = match self.registry.resolve(id) {
            Ok(capability) => capability,
            Err(e) => return Envelope::failure("capability_error", e.to_string()),
        };

        // Last-resort boundary: a panicking implementation must not leak an
        // unhandled fault past dispatch.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| capability.invoke(payload)));
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return match e.details {
                    Some(details) => Envelope::failure_with_details(e.code, e.message, details),
                    None => Envelope::failure(e.code, e.message),
                };
            }
            Err(payload) => {
                return Envelope::failure("capability_error", panic_message(payload.as_ref()));
            }
        };

        // An output mismatch is an implementation/contract defect, not a
        // caller error, but it surfaces through the same envelope.
        if let Some(violations) = check(&schemas.output, &result) {
            return Envelope::failure_with_details(
                "output_validation_error",
                "schema validation failed",
                serde_json::to_value(violations).unwrap_or(Value::Null),
            );
        }

        Envelope::success(result)
    }
}
