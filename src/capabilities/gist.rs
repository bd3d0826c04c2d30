//! `github.create_gist`: create a secret GitHub Gist via the `gh` CLI.

use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::registry::{Capability, CapabilityError, ResolutionError};

pub(crate) fn construct() -> Result<Arc<dyn Capability>, ResolutionError> {
    Ok(Arc::new(CreateGist))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Input {
    files: Vec<String>,
    content: Option<String>,
    filename: Option<String>,
    description: Option<String>,
}

fn gh_on_path() -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join("gh").is_file())
}

fn invalid(message: impl Into<String>) -> CapabilityError {
    CapabilityError::new("invalid_arguments", message)
}

fn gist_error(message: impl Into<String>) -> CapabilityError {
    CapabilityError::new("gist_error", message)
}

/// Creates a secret gist from file paths or inline content. Requires the
/// `gh` CLI on PATH, authenticated against github.com.
pub struct CreateGist;

impl Capability for CreateGist {
    fn id(&self) -> &str {
        "github.create_gist"
    }

    fn invoke(&self, payload: Value) -> Result<Value, CapabilityError> {
        let input: Input = serde_json::from_value(payload)
            .map_err(|e| CapabilityError::new("invalid_arguments", e.to_string()))?;

        if input.filename.is_some() && !input.files.is_empty() {
            return Err(invalid(
                "filename is only valid when using content (not files)",
            ));
        }
        if input.files.is_empty() && input.content.is_none() {
            return Err(invalid("provide either files or content"));
        }

        if !gh_on_path() {
            return Err(CapabilityError::new(
                "dependency_error",
                "gh not found in PATH",
            ));
        }

        let mut command = Command::new("gh");
        command.args(["gist", "create"]);
        if let Some(description) = &input.description {
            command.args(["-d", description]);
        }

        let output = if !input.files.is_empty() {
            command.args(&input.files);
            command
                .output()
                .map_err(|e| gist_error(format!("failed to run gh: {e}")))?
        } else {
            command.arg("-");
            if let Some(filename) = &input.filename {
                command.args(["-f", filename]);
            }
            command.stdin(Stdio::piped());
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
            let mut child = command
                .spawn()
                .map_err(|e| gist_error(format!("failed to run gh: {e}")))?;
            let content = input.content.as_deref().unwrap_or_default();
            if let Some(stdin) = child.stdin.as_mut() {
                stdin
                    .write_all(content.as_bytes())
                    .map_err(|e| gist_error(format!("failed to write gh stdin: {e}")))?;
            }
            child
                .wait_with_output()
                .map_err(|e| gist_error(format!("failed to run gh: {e}")))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(gist_error(if message.is_empty() {
                "gh gist create failed".to_string()
            } else {
                message.to_string()
            }));
        }

        let gist_url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if gist_url.is_empty() {
            return Err(gist_error("gh returned no gist URL"));
        }

        Ok(json!({"gist_url": gist_url}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Argument validation runs before the dependency gate and any gh
    // invocation, so these tests never touch gh or the network.

    #[test]
    fn test_filename_conflicts_with_files() {
        let err = CreateGist
            .invoke(json!({"files": ["a.txt"], "filename": "b.txt"}))
            .unwrap_err();
        assert_eq!(err.code, "invalid_arguments");
        assert!(err.message.contains("filename"));
    }

    #[test]
    fn test_requires_files_or_content() {
        let err = CreateGist.invoke(json!({})).unwrap_err();
        assert_eq!(err.code, "invalid_arguments");
        assert!(err.message.contains("files or content"));
    }

    #[test]
    fn test_malformed_payload() {
        let err = CreateGist.invoke(json!({"files": "not-a-list"})).unwrap_err();
        assert_eq!(err.code, "invalid_arguments");
    }
}
