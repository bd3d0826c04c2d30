//! Capability registry: lazy binding of contract ids to implementations.
//!
//! Discovery records, for each contract id, *where* to find the
//! implementation (a factory function) without constructing it. The factory
//! runs on first dispatch and the outcome is memoized, so a capability that
//! drags in heavy dependencies costs nothing until somebody actually calls
//! it. A factory failure is cached for the process lifetime and isolated to
//! its own id: every other capability keeps resolving normally.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use thiserror::Error;

use crate::contract::ContractStore;

/// One dispatchable operation. Implementations receive the already
/// schema-validated payload as a generic JSON value and may decode it into
/// whatever typed shape they like internally.
pub trait Capability: Send + Sync {
    /// The capability id this implementation serves (`domain.action`).
    fn id(&self) -> &str;

    /// Execute the operation. May block arbitrarily (subprocesses, network).
    fn invoke(&self, payload: Value) -> Result<Value, CapabilityError>;
}

/// A capability's own declared failure mode: an explicit `(code, message,
/// details)` triple that the dispatcher propagates through the envelope
/// verbatim.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct CapabilityError {
    /// Machine-readable error code, ideally one declared in the contract.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured context.
    pub details: Option<Value>,
}

impl CapabilityError {
    /// Build a declared error from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Failure to construct a capability implementation.
///
/// `Clone` because the registry memoizes the failed outcome and hands the
/// same error to every subsequent caller.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// No binding exists for this id.
    #[error("capability not bound: {0}")]
    Unbound(String),

    /// The factory ran and failed (missing optional dependency, bad
    /// environment, initialization fault).
    #[error("failed to construct capability {id}: {reason}")]
    Construction { id: String, reason: String },
}

/// Deferred constructor for one capability implementation.
pub type Factory = fn() -> Result<Arc<dyn Capability>, ResolutionError>;

/// A contract id bound to a not-yet-resolved implementation.
///
/// The entry-point table ([`crate::capabilities::builtin_bindings`]) is
/// declared independently of the contract documents, so contract authors
/// and implementers can evolve separately.
pub struct Binding {
    id: &'static str,
    factory: Factory,
    slot: OnceCell<Result<Arc<dyn Capability>, ResolutionError>>,
}

impl Binding {
    /// Bind a capability id to its deferred constructor.
    pub const fn new(id: &'static str, factory: Factory) -> Self {
        Self {
            id,
            factory,
            slot: OnceCell::new(),
        }
    }

    /// The bound capability id.
    pub fn id(&self) -> &'static str {
        self.id
    }
}

/// Map from capability id to its lazy binding.
///
/// Read-only after discovery; safe to resolve concurrently. Resolution
/// outcomes, success or failure alike, are cached for the process lifetime.
#[derive(Default)]
pub struct CapabilityRegistry {
    bindings: BTreeMap<String, Binding>,
}

impl CapabilityRegistry {
    /// Join contracts with entry-point bindings.
    ///
    /// A contract with no binding is dropped from the store; a binding with
    /// no contract is dropped from the registry. Both sides are warned, and
    /// afterwards `registry.ids() == store.ids()` holds. Duplicate binding
    /// ids keep the first occurrence.
    pub fn discover(store: &mut ContractStore, bindings: Vec<Binding>) -> Self {
        let mut map: BTreeMap<String, Binding> = BTreeMap::new();
        for binding in bindings {
            if map.contains_key(binding.id) {
                log::warn!("duplicate binding for {}: keeping the first", binding.id);
                continue;
            }
            if !store.contains(binding.id) {
                log::warn!("binding {} has no contract: dropped", binding.id);
                continue;
            }
            map.insert(binding.id.to_string(), binding);
        }

        let unbound: Vec<String> = store
            .ids()
            .into_iter()
            .filter(|id| !map.contains_key(*id))
            .map(String::from)
            .collect();
        for id in unbound {
            log::warn!("contract {} has no entry point: dropped", id);
            store.remove(&id);
        }

        Self { bindings: map }
    }

    /// Resolve the implementation for an id, running its factory on first
    /// use. Concurrent first use is safe: at most one caller runs the
    /// factory and everyone observes the same memoized outcome.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Capability>, ResolutionError> {
        let binding = self
            .bindings
            .get(id)
            .ok_or_else(|| ResolutionError::Unbound(id.to_string()))?;
        binding.slot.get_or_init(|| (binding.factory)()).clone()
    }

    /// Whether an id has a binding.
    pub fn contains(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    /// All bound ids, in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the registry holds no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
