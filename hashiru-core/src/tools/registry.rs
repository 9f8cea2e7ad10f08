//! `ToolRegistry`: discovers sidecar tools from two directories, tracks their create/invoke
//! costs against a `BudgetController`, dispatches calls, and self-heals after a failed
//! `ToolCreator` call.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use tokio::process::Command;
use tracing::warn;

use crate::agents::AgentRegistry;
use crate::budget::BudgetController;
use crate::error::{BudgetDimension, HashiruError};
use crate::memory::MemoryStore;
use crate::message::ToolSpec;

use super::builtins::{
    AgentCostManager, AgentCreator, AskAgent, FireAgent, GetAgents, GetBudget, MemoryManager,
    ToolCreator, ToolDeletor,
};
use super::r#trait::{Tool, ToolCallContext};
use super::sidecar::{self, SidecarManifest, SidecarTool};

struct SidecarEntry {
    source_file: PathBuf,
    manifest: SidecarManifest,
}

/// One discovery-load attempt's outcome, returned from `load()`/`reload()` for logging.
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(PathBuf, HashiruError)>,
}

pub struct ToolRegistry {
    default_dir: PathBuf,
    user_dir: PathBuf,
    budget: Arc<BudgetController>,
    interpreter: Option<PathBuf>,
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    sidecar: RwLock<HashMap<String, SidecarEntry>>,
    installed_deps: Mutex<HashSet<String>>,
    tool_creation_enabled: AtomicBool,
    tool_invocation_enabled: AtomicBool,
}

impl ToolRegistry {
    /// Builds a registry with all built-in special tools registered and attempts to locate a
    /// sidecar interpreter. Does not scan `default_dir`/`user_dir` yet; call `load()` after
    /// construction to discover sidecar tools.
    pub fn new(
        default_dir: impl Into<PathBuf>,
        user_dir: impl Into<PathBuf>,
        budget: Arc<BudgetController>,
        agents: Arc<AgentRegistry>,
        memory: Arc<MemoryStore>,
    ) -> Self {
        let user_dir = user_dir.into();
        let interpreter = match sidecar::locate_interpreter() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "no sidecar interpreter found; sidecar tool discovery disabled");
                None
            }
        };

        let registry = Self {
            default_dir: default_dir.into(),
            user_dir,
            budget,
            interpreter,
            tools: RwLock::new(HashMap::new()),
            sidecar: RwLock::new(HashMap::new()),
            installed_deps: Mutex::new(HashSet::new()),
            tool_creation_enabled: AtomicBool::new(true),
            tool_invocation_enabled: AtomicBool::new(true),
        };

        registry.register_builtin(Arc::new(ToolCreator::new(registry.user_dir.clone())));
        registry.register_builtin(Arc::new(ToolDeletor));
        registry.register_builtin(Arc::new(AgentCreator::new(agents.clone())));
        registry.register_builtin(Arc::new(AskAgent::new(agents.clone())));
        registry.register_builtin(Arc::new(FireAgent::new(agents.clone())));
        registry.register_builtin(Arc::new(GetAgents::new(agents)));
        registry.register_builtin(Arc::new(AgentCostManager));
        registry.register_builtin(Arc::new(GetBudget::new(registry.budget.clone())));
        registry.register_builtin(Arc::new(MemoryManager::new(memory)));
        registry
    }

    fn register_builtin(&self, tool: Arc<dyn Tool>) {
        self.tools.write().unwrap().insert(tool.name().to_string(), tool);
    }

    pub fn set_tool_creation_enabled(&self, enabled: bool) {
        self.tool_creation_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_tool_invocation_enabled(&self, enabled: bool) {
        self.tool_invocation_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn list(&self) -> Vec<ToolSpec> {
        self.tools.read().unwrap().values().map(|t| t.spec()).collect()
    }

    fn discover_files(&self) -> Vec<PathBuf> {
        [&self.default_dir, &self.user_dir]
            .iter()
            .filter_map(|d| std::fs::read_dir(d).ok())
            .flatten()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "py"))
            .collect()
    }

    /// Scans both tool directories for source files not yet loaded and attempts to load each.
    pub async fn load(&self) -> LoadReport {
        let mut report = LoadReport { loaded: Vec::new(), failed: Vec::new() };
        let Some(interpreter) = self.interpreter.clone() else { return report };

        let known_sources: HashSet<PathBuf> =
            self.sidecar.read().unwrap().values().map(|e| e.source_file.clone()).collect();

        for file in self.discover_files() {
            if known_sources.contains(&file) {
                continue;
            }
            match self.try_load_one(&interpreter, &file).await {
                Ok(name) => report.loaded.push(name),
                Err(e) => report.failed.push((file, e)),
            }
        }
        report
    }

    /// Re-runs discovery (alias of `load`, kept distinct for readability at call sites) and
    /// drops sidecar entries whose source file no longer exists on disk.
    pub async fn reload(&self) -> LoadReport {
        let stale: Vec<String> = {
            let sidecar = self.sidecar.read().unwrap();
            sidecar
                .iter()
                .filter(|(_, entry)| !entry.source_file.exists())
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in stale {
            self.sidecar.write().unwrap().remove(&name);
            self.tools.write().unwrap().remove(&name);
        }
        self.load().await
    }

    async fn try_load_one(&self, interpreter: &Path, file: &Path) -> Result<String, HashiruError> {
        let manifest = sidecar::describe(interpreter, file).await?;

        if self.tools.read().unwrap().contains_key(&manifest.name) {
            return Err(HashiruError::SchemaViolation(format!(
                "tool name collision: {}",
                manifest.name
            )));
        }
        if manifest.description.is_empty() {
            return Err(HashiruError::SchemaViolation(format!(
                "{} is missing a description",
                manifest.name
            )));
        }

        for dep in &manifest.dependencies {
            self.ensure_dependency_installed(dep).await;
        }

        self.budget.reserve_resource(manifest.create_resource_cost)?;
        if let Err(e) = self.budget.reserve_expense(manifest.create_expense_cost) {
            self.budget.refund_resource(manifest.create_resource_cost);
            return Err(e);
        }

        let name = manifest.name.clone();
        let tool = Arc::new(SidecarTool::new(interpreter.to_path_buf(), file.to_path_buf(), manifest.clone()));
        self.tools.write().unwrap().insert(name.clone(), tool);
        self.sidecar
            .write()
            .unwrap()
            .insert(name.clone(), SidecarEntry { source_file: file.to_path_buf(), manifest });
        Ok(name)
    }

    /// Best-effort dependency install via `pip3`; recorded as attempted regardless of outcome
    /// so a failing dependency never blocks the registry in a retry loop.
    async fn ensure_dependency_installed(&self, dep: &str) {
        if self.installed_deps.lock().unwrap().contains(dep) {
            return;
        }
        let result = Command::new("pip3").arg("install").arg(dep).output().await;
        if let Err(e) = result {
            warn!(dependency = dep, error = %e, "dependency install failed (continuing)");
        }
        self.installed_deps.lock().unwrap().insert(dep.to_string());
    }

    fn invoke_costs(&self, tool_name: &str) -> (f64, f64) {
        self.sidecar
            .read()
            .unwrap()
            .get(tool_name)
            .map(|e| (e.manifest.invoke_resource_cost, e.manifest.invoke_expense_cost))
            .unwrap_or((0.0, 0.0))
    }

    /// Dispatches one tool call by name: checks the invocation gate, charges its cost, then
    /// runs it, self-healing afterward if it was a `ToolCreator`/`ToolDeletor` call.
    #[tracing::instrument(skip(self, args, ctx))]
    pub async fn run(
        &self,
        tool_name: &str,
        args: Value,
        ctx: Option<&ToolCallContext<'_>>,
    ) -> Result<Value, HashiruError> {
        if !self.tool_invocation_enabled.load(Ordering::SeqCst) {
            return Err(HashiruError::InvocationDisabled);
        }
        if tool_name == "ToolCreator" && !self.tool_creation_enabled.load(Ordering::SeqCst) {
            return Err(HashiruError::CreationDisabled);
        }

        let tool = {
            self.tools.read().unwrap().get(tool_name).cloned()
        }
        .ok_or_else(|| HashiruError::ToolNotFound(tool_name.to_string()))?;

        let (invoke_resource_cost, invoke_expense_cost) = self.invoke_costs(tool_name);
        if !self.budget.can_spend_resource(invoke_resource_cost) {
            return Err(HashiruError::BudgetExceeded {
                dimension: BudgetDimension::Resource,
                requested: invoke_resource_cost,
                remaining: self.budget.remaining_resource(),
            });
        }
        if !self.budget.can_spend_expense(invoke_expense_cost) {
            return Err(HashiruError::BudgetExceeded {
                dimension: BudgetDimension::Expense,
                requested: invoke_expense_cost,
                remaining: self.budget.remaining_expense(),
            });
        }
        self.budget.reserve_resource(invoke_resource_cost)?;
        if let Err(e) = self.budget.reserve_expense(invoke_expense_cost) {
            self.budget.refund_resource(invoke_resource_cost);
            return Err(e);
        }

        let result = match tool.call(args.clone(), ctx).await {
            Ok(v) => v,
            Err(e) => serde_json::json!({"status": "error", "message": e.to_string(), "output": Value::Null}),
        };

        match tool_name {
            "ToolCreator" => self.self_heal_after_create(&args, result).await,
            "ToolDeletor" => {
                let _ = self.reload().await;
                Ok(result)
            }
            _ => Ok(result),
        }
    }

    /// After `ToolCreator` writes a file, attempt to load just that file. On failure, delete
    /// the file and report the underlying error to the model instead of `ToolCreator`'s own
    /// success result.
    async fn self_heal_after_create(&self, args: &Value, create_result: Value) -> Result<Value, HashiruError> {
        let Some(name) = args.get("name").and_then(|v| v.as_str()) else {
            return Ok(create_result);
        };
        let Some(interpreter) = self.interpreter.clone() else {
            return Ok(create_result);
        };

        let file_path = self.user_dir.join(format!("{name}.py"));
        match self.try_load_one(&interpreter, &file_path).await {
            Ok(_) => Ok(create_result),
            Err(e) => {
                let _ = std::fs::remove_file(&file_path);
                Ok(serde_json::json!({
                    "status": "error",
                    "message": format!(
                        "new tool '{name}' doesn't follow the required format: {e}"
                    ),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, tempfile::TempDir, ToolRegistry) {
        let default_dir = tempfile::tempdir().unwrap();
        let user_dir = tempfile::tempdir().unwrap();
        let budget = Arc::new(BudgetController::new(100.0, 0.0));
        let agents_dir = tempfile::tempdir().unwrap();
        let agents = Arc::new(
            AgentRegistry::open(
                agents_dir.path().join("models.json"),
                budget.clone(),
                Arc::new(crate::agents::OpenAiCompatibleFactory::new()),
            )
            .unwrap(),
        );
        std::mem::forget(agents_dir);
        let memory_dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(MemoryStore::open(memory_dir.path().join("memory.json")).unwrap());
        std::mem::forget(memory_dir);

        let registry = ToolRegistry::new(default_dir.path(), user_dir.path(), budget, agents, memory);
        (default_dir, user_dir, registry)
    }

    #[test]
    fn builtins_are_registered_at_construction() {
        let (_d, _u, reg) = registry();
        let names: HashSet<String> = reg.list().into_iter().map(|s| s.name).collect();
        for expected in [
            "ToolCreator",
            "ToolDeletor",
            "AgentCreator",
            "AskAgent",
            "FireAgent",
            "GetAgents",
            "AgentCostManager",
            "GetBudget",
            "MemoryManager",
        ] {
            assert!(names.contains(expected), "missing builtin {expected}");
        }
    }

    #[tokio::test]
    async fn get_budget_returns_remaining() {
        let (_d, _u, reg) = registry();
        let result = reg.run("GetBudget", serde_json::json!({}), None).await.unwrap();
        assert_eq!(result["status"], "success");
        assert!(result["output"]["resource_remaining"].is_number());
    }

    #[tokio::test]
    async fn run_unknown_tool_errors() {
        let (_d, _u, reg) = registry();
        let err = reg.run("DoesNotExist", serde_json::json!({}), None).await.unwrap_err();
        assert!(matches!(err, HashiruError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn invocation_disabled_blocks_every_tool() {
        let (_d, _u, reg) = registry();
        reg.set_tool_invocation_enabled(false);
        let err = reg.run("GetBudget", serde_json::json!({}), None).await.unwrap_err();
        assert!(matches!(err, HashiruError::InvocationDisabled));
    }

    #[tokio::test]
    async fn tool_creation_disabled_blocks_only_tool_creator() {
        let (_d, _u, reg) = registry();
        reg.set_tool_creation_enabled(false);
        let err = reg.run("ToolCreator", serde_json::json!({"name": "x", "tool_code": ""}), None).await.unwrap_err();
        assert!(matches!(err, HashiruError::CreationDisabled));
        // other tools remain usable
        reg.run("GetBudget", serde_json::json!({}), None).await.unwrap();
    }

    #[tokio::test]
    async fn memory_manager_add_then_get_round_trips() {
        let (_d, _u, reg) = registry();
        reg.run(
            "MemoryManager",
            serde_json::json!({"action": "add_memory", "key": "pet", "memory": "has a dog"}),
            None,
        )
        .await
        .unwrap();
        let result = reg
            .run("MemoryManager", serde_json::json!({"action": "get_all_memories"}), None)
            .await
            .unwrap();
        assert_eq!(result["output"][0]["key"], "pet");
    }

    #[tokio::test]
    #[ignore = "requires python3 on PATH"]
    async fn self_healing_deletes_broken_tool_after_failed_create() {
        let (_d, _u, reg) = registry();
        let result = reg
            .run(
                "ToolCreator",
                serde_json::json!({"name": "Broken", "tool_code": "def bad(:"}),
                None,
            )
            .await
            .unwrap();
        assert_eq!(result["status"], "error");
        assert!(result["message"].as_str().unwrap().contains("doesn't follow the required format"));
        assert!(!reg.list().iter().any(|t| t.name == "Broken"));
    }
}
