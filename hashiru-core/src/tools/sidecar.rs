//! Sidecar tool execution: user-authored tools run as a separate Python process rather than
//! being dynamically loaded into the Rust process.
//!
//! Each tool is one `.py` file under a discovered directory. The file is contracted to support
//! two invocations over stdin/stdout, both JSON:
//!
//! - `describe`: no stdin payload; prints `{name, description, dependencies, parameters,
//!   create_resource_cost?, invoke_resource_cost?, create_expense_cost?, invoke_expense_cost?}`.
//! - `run`: a JSON object of call arguments on stdin; prints `{status, message, output?}`.
//!
//! This mirrors the source system's tool-file contract (declared name/description/schema/
//! dependencies/costs plus a `run(**kwargs)` entry point) without requiring Rust to embed a
//! Python parser: the interpreter describes itself.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::HashiruError;
use crate::message::ToolSpec;

use super::r#trait::{Tool, ToolCallContext};

/// Manifest a sidecar tool prints in response to `describe`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SidecarManifest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub parameters: Value,
    #[serde(default)]
    pub create_resource_cost: f64,
    #[serde(default)]
    pub invoke_resource_cost: f64,
    #[serde(default)]
    pub create_expense_cost: f64,
    #[serde(default)]
    pub invoke_expense_cost: f64,
}

/// Locates the Python interpreter used to run sidecar tool files.
pub fn locate_interpreter() -> Result<PathBuf, HashiruError> {
    which::which("python3")
        .or_else(|_| which::which("python"))
        .map_err(|_| HashiruError::SchemaViolation("no python3/python interpreter found on PATH".to_string()))
}

/// Asks a tool source file to describe itself. Returns `Err(SchemaViolation)` on any failure
/// to run the process, parse its stdout as JSON, or match the manifest shape — all of which the
/// registry's discovery loop treats as "reject this file".
pub async fn describe(interpreter: &Path, source_file: &Path) -> Result<SidecarManifest, HashiruError> {
    let output = Command::new(interpreter)
        .arg(source_file)
        .arg("describe")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| HashiruError::SchemaViolation(format!("failed to run {}: {e}", source_file.display())))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HashiruError::SchemaViolation(format!(
            "{} exited with {}: {}",
            source_file.display(),
            output.status,
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| HashiruError::SchemaViolation(format!("{} printed invalid manifest JSON: {e}", source_file.display())))
}

/// A tool backed by a sidecar source file: each call spawns the interpreter fresh with the
/// call's arguments on stdin.
pub struct SidecarTool {
    interpreter: PathBuf,
    source_file: PathBuf,
    manifest: SidecarManifest,
}

impl SidecarTool {
    pub fn new(interpreter: PathBuf, source_file: PathBuf, manifest: SidecarManifest) -> Self {
        Self { interpreter, source_file, manifest }
    }

    pub fn manifest(&self) -> &SidecarManifest {
        &self.manifest
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }
}

#[async_trait]
impl Tool for SidecarTool {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.manifest.name.clone(),
            description: Some(self.manifest.description.clone()),
            input_schema: self.manifest.parameters.clone(),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        let mut child = Command::new(&self.interpreter)
            .arg(&self.source_file)
            .arg("run")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HashiruError::BackendError { message: format!("failed to spawn tool process: {e}"), retryable: false })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&args)?;
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| HashiruError::BackendError { message: format!("failed to write tool stdin: {e}"), retryable: false })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| HashiruError::BackendError { message: format!("tool process failed: {e}"), retryable: false })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(serde_json::json!({
                "status": "error",
                "message": format!("tool exited with {}: {}", output.status, stderr.trim()),
            }));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| HashiruError::BackendError { message: format!("tool printed invalid result JSON: {e}"), retryable: false })
    }
}
