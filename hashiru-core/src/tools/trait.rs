use async_trait::async_trait;
use serde_json::Value;

use crate::error::HashiruError;
use crate::message::ToolSpec;

/// Context passed to a tool call: recent conversation, for tools that need it
/// (e.g. `MemoryManager` summarizing what just happened).
#[derive(Clone, Debug, Default)]
pub struct ToolCallContext<'a> {
    pub recent_messages: Option<&'a [crate::message::Message]>,
}

/// A single tool callable by the orchestrator, either sidecar-backed (user-authored,
/// discovered from disk) or built in (`ToolCreator`, `GetBudget`, ...).
///
/// # Interaction
///
/// - **ToolRegistry**: stores tools by name, builds the `Vec<ToolSpec>` offered to the model
/// - **Orchestrator**: calls `call()` to dispatch a `FunctionCall` once budget/mode checks pass
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name; used as the function name offered to the model.
    fn name(&self) -> &str;

    /// Description and JSON schema for this tool's arguments.
    fn spec(&self) -> ToolSpec;

    /// Run with the given arguments, returning text/JSON output or a structured error.
    async fn call(
        &self,
        args: Value,
        ctx: Option<&ToolCallContext<'_>>,
    ) -> Result<Value, HashiruError>;
}
