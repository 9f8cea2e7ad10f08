//! Builds the manager `LlmClient` offering a given tool list.
//!
//! `LlmClient`'s concrete implementations bake their tool list in at construction
//! (`ChatOpenAI::with_tools`) rather than taking it per call, so the orchestrator calls this
//! factory once per turn with the registry's current tool list, instead of holding one client
//! for the whole conversation.

use std::sync::Arc;

use crate::llm::{ChatOpenAI, LlmClient};
use crate::message::ToolSpec;

pub trait ManagerClientFactory: Send + Sync {
    fn build(&self, tools: Vec<ToolSpec>) -> Arc<dyn LlmClient>;
}

/// Builds an OpenAI-backed manager client per turn, with the configured model, system
/// prompt, and a fixed temperature of 0.2.
pub struct OpenAiManagerFactory {
    model: String,
    system_prompt: String,
}

impl OpenAiManagerFactory {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self { model: model.into(), system_prompt: system_prompt.into() }
    }
}

impl ManagerClientFactory for OpenAiManagerFactory {
    fn build(&self, tools: Vec<ToolSpec>) -> Arc<dyn LlmClient> {
        Arc::new(
            ChatOpenAI::new(self.model.clone())
                .with_tools(tools)
                .with_temperature(0.2)
                .with_system_prompt(self.system_prompt.clone()),
        )
    }
}
