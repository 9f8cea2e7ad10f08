//! Built-in special tools: always present, never user-authored, wired
//! directly to the registries they wrap rather than going through the sidecar protocol.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::AgentRegistry;
use crate::budget::BudgetController;
use crate::error::HashiruError;
use crate::memory::MemoryStore;
use crate::message::ToolSpec;

use super::r#trait::{Tool, ToolCallContext};

fn arg_str(args: &Value, key: &str) -> Result<String, HashiruError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| HashiruError::SchemaViolation(format!("missing required argument: {key}")))
}

fn arg_f64(args: &Value, key: &str, default: f64) -> f64 {
    args.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

fn simple_schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Writes a new tool source file into the user-tools directory. The registry reloads after
/// every `ToolCreator` call and self-heals (deletes the file) if the reload fails.
pub struct ToolCreator {
    user_tools_dir: PathBuf,
}

impl ToolCreator {
    pub fn new(user_tools_dir: PathBuf) -> Self {
        Self { user_tools_dir }
    }
}

#[async_trait]
impl Tool for ToolCreator {
    fn name(&self) -> &str {
        "ToolCreator"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Creates a tool for the given function".to_string()),
            input_schema: simple_schema(
                serde_json::json!({
                    "name": {"type": "string", "description": "The name of the tool to create"},
                    "tool_code": {"type": "string", "description": "The code of the tool to create"},
                }),
                &["name", "tool_code"],
            ),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        let name = arg_str(&args, "name")?;
        let tool_code = arg_str(&args, "tool_code")?;
        let file_path = self.user_tools_dir.join(format!("{name}.py"));

        std::fs::create_dir_all(&self.user_tools_dir)?;
        std::fs::write(&file_path, tool_code)?;

        Ok(serde_json::json!({
            "status": "success",
            "message": "Tool created successfully",
            "output": {"tool_file_path": file_path, "tool_name": name},
        }))
    }
}

/// Removes a tool source file, used both by the model directly and by the registry's
/// self-healing path after a failed reload.
pub struct ToolDeletor;

#[async_trait]
impl Tool for ToolDeletor {
    fn name(&self) -> &str {
        "ToolDeletor"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Deletes a tool for the given function".to_string()),
            input_schema: simple_schema(
                serde_json::json!({
                    "name": {"type": "string", "description": "The name of the tool to delete"},
                    "file_path": {"type": "string", "description": "The path of the tool to delete"},
                }),
                &["name", "file_path"],
            ),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        let name = arg_str(&args, "name")?;
        let file_path = arg_str(&args, "file_path")?;
        std::fs::remove_file(&file_path)?;
        Ok(serde_json::json!({
            "status": "success",
            "message": "Tool deleted successfully",
            "output": {"tool_file_path": file_path, "tool_name": name},
        }))
    }
}

/// Thin wrapper over `AgentRegistry::create`.
pub struct AgentCreator {
    agents: Arc<AgentRegistry>,
}

impl AgentCreator {
    pub fn new(agents: Arc<AgentRegistry>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl Tool for AgentCreator {
    fn name(&self) -> &str {
        "AgentCreator"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Creates a new sub-agent backed by the given base model".to_string()),
            input_schema: simple_schema(
                serde_json::json!({
                    "name": {"type": "string"},
                    "base_model": {"type": "string"},
                    "system_prompt": {"type": "string"},
                    "description": {"type": "string"},
                    "create_resource_cost": {"type": "number"},
                    "invoke_resource_cost": {"type": "number"},
                    "create_expense_cost": {"type": "number"},
                    "invoke_expense_cost": {"type": "number"},
                }),
                &["name", "base_model", "system_prompt", "description"],
            ),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        let name = arg_str(&args, "name")?;
        let base_model = arg_str(&args, "base_model")?;
        let system_prompt = arg_str(&args, "system_prompt")?;
        let description = arg_str(&args, "description")?;

        self.agents.create(
            &name,
            &base_model,
            &system_prompt,
            &description,
            arg_f64(&args, "create_resource_cost", 0.0),
            arg_f64(&args, "invoke_resource_cost", 0.0),
            arg_f64(&args, "create_expense_cost", 0.0),
            arg_f64(&args, "invoke_expense_cost", 0.0),
        )?;

        Ok(serde_json::json!({"status": "success", "message": format!("agent {name} created")}))
    }
}

/// Thin wrapper over `AgentRegistry::ask`.
pub struct AskAgent {
    agents: Arc<AgentRegistry>,
}

impl AskAgent {
    pub fn new(agents: Arc<AgentRegistry>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl Tool for AskAgent {
    fn name(&self) -> &str {
        "AskAgent"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Sends a prompt to a previously created sub-agent".to_string()),
            input_schema: simple_schema(
                serde_json::json!({
                    "name": {"type": "string"},
                    "prompt": {"type": "string"},
                }),
                &["name", "prompt"],
            ),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        let name = arg_str(&args, "name")?;
        let prompt = arg_str(&args, "prompt")?;
        let outcome = self.agents.ask(&name, &prompt).await?;
        Ok(serde_json::json!({
            "status": "success",
            "message": outcome.text,
            "output": {
                "resource_remaining": outcome.resource_remaining,
                "expense_remaining": outcome.expense_remaining,
            },
        }))
    }
}

/// Thin wrapper over `AgentRegistry::delete`.
pub struct FireAgent {
    agents: Arc<AgentRegistry>,
}

impl FireAgent {
    pub fn new(agents: Arc<AgentRegistry>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl Tool for FireAgent {
    fn name(&self) -> &str {
        "FireAgent"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Deletes a sub-agent and refunds its creation cost".to_string()),
            input_schema: simple_schema(serde_json::json!({"name": {"type": "string"}}), &["name"]),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        let name = arg_str(&args, "name")?;
        self.agents.delete(&name)?;
        Ok(serde_json::json!({"status": "success", "message": format!("agent {name} fired")}))
    }
}

/// Thin wrapper over `AgentRegistry::list`.
pub struct GetAgents {
    agents: Arc<AgentRegistry>,
}

impl GetAgents {
    pub fn new(agents: Arc<AgentRegistry>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl Tool for GetAgents {
    fn name(&self) -> &str {
        "GetAgents"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Lists all currently created sub-agents".to_string()),
            input_schema: simple_schema(serde_json::json!({}), &[]),
        }
    }

    async fn call(&self, _args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        let agents = self.agents.list();
        Ok(serde_json::json!({
            "status": "success",
            "message": format!("{} agents", agents.len()),
            "output": agents,
        }))
    }
}

/// Returns the static model cost catalog so the manager can consult costs before creating
/// agents.
pub struct AgentCostManager;

#[async_trait]
impl Tool for AgentCostManager {
    fn name(&self) -> &str {
        "AgentCostManager"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Returns a static catalog of known models and their costs".to_string()),
            input_schema: simple_schema(serde_json::json!({}), &[]),
        }
    }

    async fn call(&self, _args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        Ok(serde_json::json!({
            "status": "success",
            "message": "model cost catalog",
            "output": model_spec_core::cost_catalog(),
        }))
    }
}

/// Reports remaining resource/expense budget.
pub struct GetBudget {
    budget: Arc<BudgetController>,
}

impl GetBudget {
    pub fn new(budget: Arc<BudgetController>) -> Self {
        Self { budget }
    }
}

#[async_trait]
impl Tool for GetBudget {
    fn name(&self) -> &str {
        "GetBudget"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Returns remaining resource and expense budget".to_string()),
            input_schema: simple_schema(serde_json::json!({}), &[]),
        }
    }

    async fn call(&self, _args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        Ok(serde_json::json!({
            "status": "success",
            "message": "budget remaining",
            "output": {
                "resource_remaining": self.budget.remaining_resource(),
                "expense_remaining": self.budget.remaining_expense(),
            },
        }))
    }
}

/// Updates, retrieves, or deletes long-term memory, grounded directly on the source system's
/// `MemoryManager` tool contract (`add_memory`/`get_all_memories`/`delete_memory`).
pub struct MemoryManager {
    store: Arc<MemoryStore>,
}

impl MemoryManager {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryManager {
    fn name(&self) -> &str {
        "MemoryManager"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: Some("Updates, retrieves, or deletes the memory of an AI agent.".to_string()),
            input_schema: simple_schema(
                serde_json::json!({
                    "action": {
                        "type": "string",
                        "enum": ["add_memory", "get_all_memories", "delete_memory"],
                        "description": "The action to perform.",
                    },
                    "memory": {"type": "string", "description": "The memory to add. Required for add_memory."},
                    "key": {"type": "string", "description": "The key to add or delete memory."},
                }),
                &["action"],
            ),
        }
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolCallContext<'_>>) -> Result<Value, HashiruError> {
        let action = arg_str(&args, "action")?;
        match action.as_str() {
            "get_all_memories" => Ok(serde_json::json!({
                "status": "success",
                "message": "Memory retrieved successfully",
                "output": self.store.list(),
            })),
            "add_memory" => {
                let memory = args.get("memory").and_then(|v| v.as_str());
                let key = args.get("key").and_then(|v| v.as_str());
                let (Some(memory), Some(key)) = (memory, key) else {
                    return Ok(serde_json::json!({
                        "status": "error",
                        "message": "Memory and key are required for add_memory action",
                    }));
                };
                match self.store.add(key, memory) {
                    Ok(()) => Ok(serde_json::json!({"status": "success", "message": "Memory created successfully"})),
                    Err(HashiruError::DuplicateKey(k)) => Ok(serde_json::json!({
                        "status": "error",
                        "message": format!("Memory with key {k} already exists"),
                    })),
                    Err(e) => Err(e),
                }
            }
            "delete_memory" => {
                let Some(key) = args.get("key").and_then(|v| v.as_str()) else {
                    return Ok(serde_json::json!({
                        "status": "error",
                        "message": "Key is required for delete_memory action",
                    }));
                };
                match self.store.delete(key) {
                    Ok(()) => Ok(serde_json::json!({"status": "success", "message": "Memory deleted successfully"})),
                    Err(HashiruError::ToolNotFound(_)) => Ok(serde_json::json!({
                        "status": "error",
                        "message": format!("Memory with key {key} not found"),
                    })),
                    Err(e) => Err(e),
                }
            }
            other => Ok(serde_json::json!({
                "status": "error",
                "message": format!("unknown MemoryManager action: {other}"),
            })),
        }
    }
}
