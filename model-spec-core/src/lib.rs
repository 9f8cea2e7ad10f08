//! Model/provider resolution shared between `hashiru-core`'s `AgentRegistry` and any CLI
//! tooling that needs to validate a `base_model` string before calling into it.
//!
//! Kept as a separate crate (no dependency on `hashiru-core`) so it can be reused by a
//! sidecar or CLI without pulling in the orchestrator, registries, or async runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend family a `base_model` string resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Local,
    CloudGemini,
    CloudGroq,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported model: {0}")]
pub struct UnsupportedModel(pub String);

/// Resolves a `base_model` string to the backend family that serves it.
///
/// - prefix/exact match `llama`, `mistral`, `deepseek` → [`AgentType::Local`] (Ollama-class).
/// - contains `gemini` → [`AgentType::CloudGemini`].
/// - contains `groq` → [`AgentType::CloudGroq`].
/// - otherwise → [`UnsupportedModel`].
pub fn resolve(base_model: &str) -> Result<AgentType, UnsupportedModel> {
    let lower = base_model.to_lowercase();
    if lower.starts_with("llama") || lower.starts_with("mistral") || lower.starts_with("deepseek") {
        Ok(AgentType::Local)
    } else if lower.contains("gemini") {
        Ok(AgentType::CloudGemini)
    } else if lower.contains("groq") {
        Ok(AgentType::CloudGroq)
    } else {
        Err(UnsupportedModel(base_model.to_string()))
    }
}

/// Static cost entry for one `base_model` identifier, as returned by the `AgentCostManager`
/// built-in tool so the manager can consult costs before creating an agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelCostEntry {
    pub base_model: String,
    pub description: String,
    pub create_resource_cost: f64,
    pub invoke_resource_cost: f64,
    pub create_expense_cost: f64,
    pub invoke_expense_cost: f64,
}

/// Static catalog of known models and their costs, grounded on the source system's model
/// manager set (Ollama-class local models, Gemini, Groq).
pub fn cost_catalog() -> Vec<ModelCostEntry> {
    vec![
        ModelCostEntry {
            base_model: "llama3.1".into(),
            description: "Meta Llama 3.1, served locally via an Ollama-class daemon".into(),
            create_resource_cost: 10.0,
            invoke_resource_cost: 2.0,
            create_expense_cost: 0.0,
            invoke_expense_cost: 0.0,
        },
        ModelCostEntry {
            base_model: "mistral-small-latest".into(),
            description: "Mistral Small, served locally via an Ollama-class daemon".into(),
            create_resource_cost: 8.0,
            invoke_resource_cost: 1.5,
            create_expense_cost: 0.0,
            invoke_expense_cost: 0.0,
        },
        ModelCostEntry {
            base_model: "deepseek-r1".into(),
            description: "DeepSeek R1, served locally via an Ollama-class daemon".into(),
            create_resource_cost: 12.0,
            invoke_resource_cost: 2.5,
            create_expense_cost: 0.0,
            invoke_expense_cost: 0.0,
        },
        ModelCostEntry {
            base_model: "gemini-2.0-flash".into(),
            description: "Google Gemini 2.0 Flash, cloud-hosted".into(),
            create_resource_cost: 1.0,
            invoke_resource_cost: 0.0,
            create_expense_cost: 0.0,
            invoke_expense_cost: 0.10,
        },
        ModelCostEntry {
            base_model: "groq-llama3-70b".into(),
            description: "Llama 3 70B served via Groq, cloud-hosted".into(),
            create_resource_cost: 1.0,
            invoke_resource_cost: 0.0,
            create_expense_cost: 0.0,
            invoke_expense_cost: 0.05,
        },
    ]
}

/// Looks up one entry from [`cost_catalog`] by exact `base_model` match.
pub fn cost_for_model(base_model: &str) -> Option<ModelCostEntry> {
    cost_catalog().into_iter().find(|e| e.base_model == base_model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_local_models_by_prefix() {
        assert_eq!(resolve("llama3.1:8b").unwrap(), AgentType::Local);
        assert_eq!(resolve("mistral-small-latest").unwrap(), AgentType::Local);
        assert_eq!(resolve("deepseek-r1").unwrap(), AgentType::Local);
    }

    #[test]
    fn resolves_cloud_models_by_substring() {
        assert_eq!(resolve("models/gemini-2.0-flash").unwrap(), AgentType::CloudGemini);
        assert_eq!(resolve("groq-llama3-70b").unwrap(), AgentType::CloudGroq);
    }

    #[test]
    fn unknown_model_is_unsupported() {
        let err = resolve("gpt-4o").unwrap_err();
        assert_eq!(err, UnsupportedModel("gpt-4o".to_string()));
    }

    #[test]
    fn cost_catalog_has_entry_for_every_resolvable_family() {
        for entry in cost_catalog() {
            resolve(&entry.base_model).unwrap();
        }
    }
}
