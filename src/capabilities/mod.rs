//! Built-in capability plugins.
//!
//! Each submodule is one self-contained capability implementation; its
//! contract document lives in the repository's `capabilities/<plugin>/`
//! directory. The entry-point table below is declared independently of the
//! contract documents so contract authors and implementers can evolve
//! separately; discovery joins the two and drops either side when its
//! counterpart is missing.

pub mod gist;
pub mod text_normalize;
pub mod usage_cost;

use crate::registry::Binding;

/// Entry-point table for the built-in capabilities. Constructors run
/// lazily, on first dispatch to each id.
pub fn builtin_bindings() -> Vec<Binding> {
    vec![
        Binding::new("github.create_gist", gist::construct),
        Binding::new("openai.calculate_usage_cost", usage_cost::construct),
        Binding::new("text.normalize_markdown", text_normalize::construct),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractStore;
    use crate::registry::CapabilityRegistry;
    use std::path::Path;

    fn shipped_contracts_dir() -> &'static Path {
        Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/capabilities"))
    }

    #[test]
    fn test_every_binding_has_a_shipped_contract() {
        let mut store = ContractStore::new();
        let loaded = store.load_dir(shipped_contracts_dir()).unwrap();
        assert_eq!(loaded, builtin_bindings().len());

        let registry = CapabilityRegistry::discover(&mut store, builtin_bindings());
        assert_eq!(
            registry.ids(),
            vec![
                "github.create_gist",
                "openai.calculate_usage_cost",
                "text.normalize_markdown",
            ]
        );
        assert_eq!(registry.ids(), store.ids());
    }

    #[test]
    fn test_binding_ids_match_implementations() {
        let mut store = ContractStore::new();
        store.load_dir(shipped_contracts_dir()).unwrap();
        let registry = CapabilityRegistry::discover(&mut store, builtin_bindings());
        for id in registry.ids() {
            let capability = registry.resolve(id).unwrap();
            assert_eq!(capability.id(), id);
        }
    }

    #[test]
    fn test_normalize_markdown_end_to_end() {
        let dispatcher =
            crate::dispatch::Dispatcher::discover_from(shipped_contracts_dir(), builtin_bindings())
                .unwrap();

        let envelope = dispatcher.dispatch(
            "text.normalize_markdown",
            serde_json::json!({"text": "hello  \nworld"}),
        );
        assert!(envelope.ok);
        let result = envelope.result.unwrap();
        assert_eq!(result["text"], "hello\nworld\n");
        assert_eq!(
            result["changes"],
            serde_json::json!(["trim_trailing_whitespace", "ensure_final_newline"])
        );

        // The shipped contract forbids unknown properties.
        let envelope = dispatcher.dispatch(
            "text.normalize_markdown",
            serde_json::json!({"text": "x", "bogus": 1}),
        );
        assert!(!envelope.ok);
        assert_eq!(envelope.error.unwrap().error_type, "validation_error");
    }
}
