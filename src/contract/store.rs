//! Contract store: discovery of contract documents from plugin locations.
//!
//! The store scans a plugin root directory; each subdirectory is one plugin
//! and holds exactly one `contract.v1.json`. A plugin with a missing,
//! malformed, or invalid document is skipped with a warning, so discovery
//! never fails globally because of one bad plugin.
//!
//! Validators for both schemas are compiled once at registration time, so
//! dispatch never re-parses a schema.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use jsonschema::Validator;

use super::{Contract, ContractError};

/// Well-known contract document name inside each plugin directory.
pub const CONTRACT_FILE_NAME: &str = "contract.v1.json";

/// Compiled input/output schema validators for one contract.
pub struct CompiledSchemas {
    /// Validator for the contract's `input_schema`.
    pub input: Validator,
    /// Validator for the contract's `output_schema`.
    pub output: Validator,
}

/// Read-only collection of capability contracts, keyed by id.
///
/// Built once at process start (or per re-discovery run) and never mutated
/// afterward; re-discovery produces a fresh store rather than patching the
/// live one.
#[derive(Default)]
pub struct ContractStore {
    contracts: BTreeMap<String, Contract>,
    compiled: HashMap<String, CompiledSchemas>,
}

impl ContractStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract, compiling both schema validators.
    ///
    /// Fails on duplicate ids, absent schemas, and schemas that do not
    /// compile. The contract and its validators are inserted together or
    /// not at all.
    pub fn insert(&mut self, contract: Contract) -> Result<(), ContractError> {
        if self.contracts.contains_key(&contract.name) {
            return Err(ContractError::Duplicate(contract.name));
        }
        if !contract.is_valid() {
            return Err(ContractError::MissingSchema {
                id: contract.name,
                which: "input/output",
            });
        }
        let input = jsonschema::validator_for(&contract.input_schema).map_err(|e| {
            ContractError::SchemaCompile {
                id: contract.name.clone(),
                which: "input",
                reason: e.to_string(),
            }
        })?;
        let output = jsonschema::validator_for(&contract.output_schema).map_err(|e| {
            ContractError::SchemaCompile {
                id: contract.name.clone(),
                which: "output",
                reason: e.to_string(),
            }
        })?;
        self.compiled
            .insert(contract.name.clone(), CompiledSchemas { input, output });
        self.contracts.insert(contract.name.clone(), contract);
        Ok(())
    }

    /// Scan one plugin root: every immediate subdirectory containing a
    /// `contract.v1.json` is read as one plugin. Returns the number of
    /// contracts loaded. A nonexistent root loads zero contracts.
    pub fn load_dir(&mut self, root: &Path) -> Result<usize, ContractError> {
        if !root.exists() {
            return Ok(0);
        }

        let mut entries: Vec<_> = fs::read_dir(root)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.path());

        let mut count = 0;
        for entry in entries {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let doc = path.join(CONTRACT_FILE_NAME);
            if !doc.is_file() {
                continue;
            }
            let text = match fs::read_to_string(&doc) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("failed to read {}: {}", doc.display(), e);
                    continue;
                }
            };
            let contract = match Contract::from_json(&text) {
                Ok(contract) => contract,
                Err(e) => {
                    log::warn!("skipping {}: {}", doc.display(), e);
                    continue;
                }
            };
            match self.insert(contract) {
                Ok(()) => count += 1,
                Err(e) => log::warn!("skipping {}: {}", doc.display(), e),
            }
        }

        Ok(count)
    }

    /// Look up a contract by capability id.
    pub fn get(&self, id: &str) -> Option<&Contract> {
        self.contracts.get(id)
    }

    /// Compiled validators for a contract id.
    pub fn schemas(&self, id: &str) -> Option<&CompiledSchemas> {
        self.compiled.get(id)
    }

    /// Whether a contract with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.contracts.contains_key(id)
    }

    /// All capability ids, in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        self.contracts.keys().map(String::as_str).collect()
    }

    /// All contracts, in id order.
    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.values()
    }

    /// Drop a contract and its validators. Used by registry discovery to
    /// uphold `registry.keys() == contracts.keys()`.
    pub(crate) fn remove(&mut self, id: &str) -> Option<Contract> {
        self.compiled.remove(id);
        self.contracts.remove(id)
    }

    /// Number of registered contracts.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Whether the store holds no contracts.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn contract(name: &str) -> Contract {
        Contract::from_json(
            &json!({
                "name": name,
                "description": "A test capability",
                "input_schema": {"type": "object"},
                "output_schema": {"type": "object"},
            })
            .to_string(),
        )
        .unwrap()
    }

    fn write_plugin(root: &Path, dir: &str, body: &str) {
        let plugin = root.join(dir);
        fs::create_dir_all(&plugin).unwrap();
        fs::write(plugin.join(CONTRACT_FILE_NAME), body).unwrap();
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = ContractStore::new();
        store.insert(contract("test.echo")).unwrap();
        assert!(store.contains("test.echo"));
        assert!(store.schemas("test.echo").is_some());
        assert_eq!(store.get("test.echo").unwrap().name, "test.echo");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let mut store = ContractStore::new();
        store.insert(contract("test.echo")).unwrap();
        assert!(matches!(
            store.insert(contract("test.echo")),
            Err(ContractError::Duplicate(_))
        ));
    }

    #[test]
    fn test_ids_sorted() {
        let mut store = ContractStore::new();
        store.insert(contract("b.two")).unwrap();
        store.insert(contract("a.one")).unwrap();
        assert_eq!(store.ids(), vec!["a.one", "b.two"]);
    }

    #[test]
    fn test_load_dir_skips_bad_plugins() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();

        write_plugin(
            root,
            "good",
            &json!({
                "name": "test.good",
                "input_schema": {"type": "object"},
                "output_schema": {"type": "object"},
            })
            .to_string(),
        );
        write_plugin(root, "malformed", "{not json");
        write_plugin(
            root,
            "no_name",
            &json!({
                "input_schema": {"type": "object"},
                "output_schema": {"type": "object"},
            })
            .to_string(),
        );
        write_plugin(
            root,
            "no_output",
            &json!({
                "name": "test.no_output",
                "input_schema": {"type": "object"},
            })
            .to_string(),
        );
        // A plugin directory without any contract document is not an error.
        fs::create_dir_all(root.join("empty")).unwrap();

        let mut store = ContractStore::new();
        let loaded = store.load_dir(root).unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(store.ids(), vec!["test.good"]);
    }

    #[test]
    fn test_load_dir_missing_root_is_empty() {
        let mut store = ContractStore::new();
        let loaded = store.load_dir(Path::new("/nonexistent/opsbox")).unwrap();
        assert_eq!(loaded, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_drops_validators_too() {
        let mut store = ContractStore::new();
        store.insert(contract("test.echo")).unwrap();
        store.remove("test.echo");
        assert!(!store.contains("test.echo"));
        assert!(store.schemas("test.echo").is_none());
    }
}
