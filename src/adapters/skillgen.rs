//! Skill documentation stub generation.
//!
//! Turns each contract into a `SKILL.md` stub for conversational-agent
//! surfaces: a frontmatter header, an invocation example built from the
//! required properties, a parameter table, and optional error-code and
//! side-effect sections.
//!
//! Generation is non-destructive by default: existing documents are left
//! alone, and a document under a *different* slug that already covers a
//! capability (detected by marker scan) also blocks generation unless the
//! force flag is set.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::contract::{Contract, ContractStore, ErrorSpec};

/// Derive a kebab-case skill slug from a capability id.
///
/// `infra.fleet_health` -> `fleet-health`: strip the domain prefix, replace
/// underscores with hyphens.
pub fn slug_from_id(id: &str) -> String {
    let action = id.split_once('.').map_or(id, |(_, action)| action);
    action.replace('_', "-")
}

fn title_case(slug: &str) -> String {
    slug.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a type spec for the parameter table. Union types drop `null` and
/// render the remainder as `a | b?`.
fn render_type(spec: &Value) -> String {
    match spec.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => {
            let nullable = types.iter().any(|t| t == "null");
            let joined = types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| *t != "null")
                .collect::<Vec<_>>()
                .join(" | ");
            if nullable {
                format!("{joined}?")
            } else {
                joined
            }
        }
        _ => "any".to_string(),
    }
}

fn render_enum_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the markdown parameter table from an input schema.
fn param_table(schema: &Value) -> String {
    let props = schema.get("properties").and_then(Value::as_object);
    let Some(props) = props.filter(|p| !p.is_empty()) else {
        return "_No parameters._".to_string();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut rows = vec![
        "| Parameter | Type | Required | Default | Description |".to_string(),
        "|-----------|------|----------|---------|-------------|".to_string(),
    ];

    for (name, spec) in props {
        let ptype = render_type(spec);
        let req = if required.contains(&name.as_str()) {
            "yes"
        } else {
            "no"
        };
        let default = match spec.get("default") {
            None | Some(Value::Null) => "—".to_string(),
            Some(value) => format!("`{}`", value),
        };
        let mut desc = spec
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        // Collapse enum values into the description.
        if let Some(values) = spec.get("enum").and_then(Value::as_array) {
            let vals = values
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| format!("`{}`", render_enum_value(v)))
                .collect::<Vec<_>>()
                .join(", ");
            desc = if desc.is_empty() {
                format!("One of: {vals}.")
            } else {
                format!("{desc} Values: {vals}.")
            };
        }
        rows.push(format!("| `{name}` | {ptype} | {req} | {default} | {desc} |"));
    }

    rows.join("\n")
}

fn error_table(errors: &[ErrorSpec]) -> String {
    let mut rows = vec![
        "| Code | Description |".to_string(),
        "|------|-------------|".to_string(),
    ];
    for error in errors {
        rows.push(format!("| `{}` | {} |", error.code, error.description));
    }
    rows.join("\n")
}

/// Build an example invocation from the required properties only, with
/// per-type placeholder values.
fn example_call(id: &str, schema: &Value) -> String {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let props = schema.get("properties").and_then(Value::as_object);

    let mut parts = Vec::new();
    if let Some(props) = props {
        for (name, spec) in props {
            if !required.contains(&name.as_str()) {
                continue;
            }
            let ptype = match spec.get("type") {
                Some(Value::String(t)) => t.clone(),
                Some(Value::Array(types)) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|t| *t != "null")
                    .unwrap_or("string")
                    .to_string(),
                _ => "string".to_string(),
            };
            let part = match ptype.as_str() {
                "string" => format!("{name}=\"...\""),
                "boolean" => format!("{name}=true"),
                "integer" | "number" => format!("{name}=0"),
                "array" => format!("{name}=[\"...\"]"),
                _ => format!("{name}=..."),
            };
            parts.push(part);
        }
    }
    format!("{id}({})", parts.join(", "))
}

/// Generate the SKILL.md content for one contract. Deterministic: the same
/// contract always renders to the same bytes.
pub fn generate_skill(contract: &Contract) -> String {
    let slug = slug_from_id(&contract.name);
    let mut lines: Vec<String> = Vec::new();

    // Frontmatter
    lines.push("---".to_string());
    lines.push(format!("name: {slug}"));
    lines.push(format!("description: {}", contract.description));
    lines.push("---".to_string());
    lines.push(String::new());

    // Header
    lines.push(format!("# {}", title_case(&slug)));
    lines.push(String::new());
    lines.push(contract.description.clone());
    lines.push(String::new());

    // Invocation
    lines.push("## Invocation".to_string());
    lines.push(String::new());
    lines.push(format!("Call the `{}` capability via MCP:", contract.name));
    lines.push(String::new());
    lines.push("```".to_string());
    lines.push(example_call(&contract.name, &contract.input_schema));
    lines.push("```".to_string());
    lines.push(String::new());

    // Parameters
    lines.push("## Parameters".to_string());
    lines.push(String::new());
    lines.push(param_table(&contract.input_schema));
    lines.push(String::new());

    if !contract.errors.is_empty() {
        lines.push("## Error Codes".to_string());
        lines.push(String::new());
        lines.push(error_table(&contract.errors));
        lines.push(String::new());
    }

    if !contract.side_effects.is_empty() {
        lines.push("## Side Effects".to_string());
        lines.push(String::new());
        lines.push(contract.side_effects.clone());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Check whether any existing SKILL.md under `skills_dir` already wraps
/// this capability, including handwritten documents under a different
/// slug. Looks for id-referencing markers, not passing mentions. Returns
/// the covering skill's slug.
pub fn existing_skill_covers(id: &str, skills_dir: &Path) -> Option<String> {
    if !skills_dir.is_dir() {
        return None;
    }
    let markers = [
        format!("`{id}` capability"),
        format!("Call the `{id}`"),
        format!("`{id}` via MCP"),
    ];

    let mut dirs: Vec<PathBuf> = fs::read_dir(skills_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let skill_md = dir.join("SKILL.md");
        let Ok(content) = fs::read_to_string(&skill_md) else {
            continue;
        };
        if markers.iter().any(|m| content.contains(m)) {
            return dir.file_name().map(|n| n.to_string_lossy().into_owned());
        }
    }
    None
}

/// Options for a skill-stub generation run.
#[derive(Debug, Clone, Default)]
pub struct SkillGenOptions {
    /// Directory holding one `<slug>/SKILL.md` per skill.
    pub out_dir: PathBuf,
    /// Overwrite existing and covered documents.
    pub force: bool,
    /// Report what would be written without touching the filesystem.
    pub dry_run: bool,
    /// Restrict the run to a single capability id.
    pub only: Option<String>,
}

/// Outcome of one contract in a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillStatus {
    Created,
    Overwritten,
    /// A document for this slug already exists.
    SkippedExists,
    /// A differently-named document already covers this id.
    SkippedCovered(String),
    /// Dry run: would have written.
    WouldWrite,
}

/// One contract's action in a generation run.
#[derive(Debug, Clone)]
pub struct SkillAction {
    pub id: String,
    pub slug: String,
    pub path: PathBuf,
    pub status: SkillStatus,
    /// Rendered content, carried for dry runs.
    pub content: Option<String>,
}

impl SkillAction {
    /// Whether this action counts as generated (vs. skipped).
    pub fn generated(&self) -> bool {
        matches!(
            self.status,
            SkillStatus::Created | SkillStatus::Overwritten | SkillStatus::WouldWrite
        )
    }
}

/// Generate skill stubs for every contract in the store, in id order.
pub fn generate_all(
    store: &ContractStore,
    opts: &SkillGenOptions,
) -> std::io::Result<Vec<SkillAction>> {
    let mut actions = Vec::new();

    for contract in store.contracts() {
        if let Some(only) = &opts.only {
            if &contract.name != only {
                continue;
            }
        }

        let slug = slug_from_id(&contract.name);
        let path = opts.out_dir.join(&slug).join("SKILL.md");
        let exists = path.exists();

        if exists && !opts.force {
            actions.push(SkillAction {
                id: contract.name.clone(),
                slug,
                path,
                status: SkillStatus::SkippedExists,
                content: None,
            });
            continue;
        }

        if !opts.force {
            if let Some(covered_by) = existing_skill_covers(&contract.name, &opts.out_dir) {
                actions.push(SkillAction {
                    id: contract.name.clone(),
                    slug,
                    path,
                    status: SkillStatus::SkippedCovered(covered_by),
                    content: None,
                });
                continue;
            }
        }

        let content = generate_skill(contract);

        if opts.dry_run {
            actions.push(SkillAction {
                id: contract.name.clone(),
                slug,
                path,
                status: SkillStatus::WouldWrite,
                content: Some(content),
            });
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &content)?;
        actions.push(SkillAction {
            id: contract.name.clone(),
            slug,
            path,
            status: if exists {
                SkillStatus::Overwritten
            } else {
                SkillStatus::Created
            },
            content: None,
        });
    }

    Ok(actions)
}
