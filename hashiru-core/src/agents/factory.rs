//! Builds the `LlmClient` backend for a newly created or reconstructed agent.
//!
//! All three agent types speak an OpenAI-compatible chat API (Ollama's `/v1` surface for local
//! models, Gemini's OpenAI-compatible beta endpoint, Groq's OpenAI-compatible endpoint), so one
//! `ChatOpenAI` client per agent, pointed at the right base URL and key, covers all of them.

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_trait::async_trait;
use model_spec_core::AgentType;

use crate::error::HashiruError;
use crate::llm::{ChatOpenAI, LlmClient};

/// Constructs a backend instance for an agent given its resolved type, model, and system
/// prompt. Swappable so tests can stub out network construction entirely.
#[async_trait]
pub trait AgentBackendFactory: Send + Sync {
    fn build(
        &self,
        agent_type: AgentType,
        base_model: &str,
        system_prompt: &str,
    ) -> Result<Arc<dyn LlmClient>, HashiruError>;
}

/// Default factory: one `ChatOpenAI` client per agent type, each pointed at the
/// OpenAI-compatible endpoint for that backend family.
///
/// - `Local`: `OLLAMA_BASE_URL` (default `http://localhost:11434/v1`), no key required.
/// - `CloudGemini`: Gemini's OpenAI-compatible endpoint, keyed by `GEMINI_KEY`.
/// - `CloudGroq`: Groq's OpenAI-compatible endpoint, keyed by `GROQ_API_KEY`.
pub struct OpenAiCompatibleFactory;

impl OpenAiCompatibleFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OpenAiCompatibleFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentBackendFactory for OpenAiCompatibleFactory {
    fn build(
        &self,
        agent_type: AgentType,
        base_model: &str,
        system_prompt: &str,
    ) -> Result<Arc<dyn LlmClient>, HashiruError> {
        let config = match agent_type {
            AgentType::Local => {
                let base = std::env::var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
                OpenAIConfig::new().with_api_base(base).with_api_key("ollama")
            }
            AgentType::CloudGemini => {
                let key = std::env::var("GEMINI_KEY").map_err(|_| HashiruError::BackendError {
                    message: "GEMINI_KEY is not set".to_string(),
                    retryable: false,
                })?;
                OpenAIConfig::new()
                    .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai")
                    .with_api_key(key)
            }
            AgentType::CloudGroq => {
                let key = std::env::var("GROQ_API_KEY").map_err(|_| HashiruError::BackendError {
                    message: "GROQ_API_KEY is not set".to_string(),
                    retryable: false,
                })?;
                OpenAIConfig::new()
                    .with_api_base("https://api.groq.com/openai/v1")
                    .with_api_key(key)
            }
        };

        let client = ChatOpenAI::with_config(config, base_model)
            .with_tools(vec![])
            .with_temperature(0.2)
            .with_system_prompt(system_prompt);

        Ok(Arc::new(client))
    }
}
