//! Tool system: the `Tool` trait every callable implements, built-in special tools, the
//! sidecar protocol for user-authored tools, and the registry that ties them together.

mod builtins;
mod registry;
mod sidecar;
mod r#trait;

pub use builtins::{
    AgentCostManager, AgentCreator, AskAgent, FireAgent, GetAgents, GetBudget, MemoryManager,
    ToolCreator, ToolDeletor,
};
pub use r#trait::{Tool, ToolCallContext};
pub use registry::{LoadReport, ToolRegistry};
pub use sidecar::{describe, locate_interpreter, SidecarManifest, SidecarTool};
