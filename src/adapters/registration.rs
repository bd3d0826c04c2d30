//! Direct protocol registration.
//!
//! Binds `dispatch(id, payload)` as the handler a hosting protocol layer
//! invokes, passing the contract's input schema through unmodified as the
//! caller-visible parameter schema. Registration is an explicit call made
//! once after discovery completes, never a side effect of loading a file.

use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::{Dispatcher, Envelope};

use super::strip_schema_meta;

/// How the host protocol names tools. Some protocols forbid dots in tool
/// names; for those the capability id's dots become underscores, a 1:1
/// mapping since ids never contain underscore-separated domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingRule {
    /// Use the capability id verbatim (`text.normalize_markdown`).
    Dotted,
    /// Replace dots with underscores (`text_normalize_markdown`).
    Underscored,
}

impl NamingRule {
    /// Render a capability id under this rule.
    pub fn apply(&self, id: &str) -> String {
        match self {
            Self::Dotted => id.to_string(),
            Self::Underscored => id.replace('.', "_"),
        }
    }
}

/// One tool registration for a hosting protocol: the caller-visible name,
/// description and parameter schema, plus a handler that funnels the call
/// into the dispatcher. The handler always returns an envelope; the host
/// never observes a fault.
pub struct ToolRegistration {
    /// Tool name under the host's naming rule.
    pub name: String,
    /// Contract description, verbatim.
    pub description: String,
    /// Input schema (minus `$schema`), passed through unmodified.
    pub parameters: Value,
    /// Dispatch callback for this capability.
    pub handler: Box<dyn Fn(Value) -> Envelope + Send + Sync>,
}

/// Build one registration per contract, wired back into the dispatcher.
/// Returned in id order.
pub fn register_all(dispatcher: Arc<Dispatcher>, rule: NamingRule) -> Vec<ToolRegistration> {
    let store = dispatcher.store_arc();
    store
        .contracts()
        .map(|contract| {
            let id = contract.name.clone();
            let dispatcher = Arc::clone(&dispatcher);
            ToolRegistration {
                name: rule.apply(&contract.name),
                description: contract.description.clone(),
                parameters: strip_schema_meta(&contract.input_schema),
                handler: Box::new(move |payload| dispatcher.dispatch(&id, payload)),
            }
        })
        .collect()
}
