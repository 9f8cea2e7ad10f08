//! Agent registry: named, model-backed sub-agents the orchestrator's `AgentCreator`/`AskAgent`/
//! `FireAgent`/`GetAgents` tools operate on.
//!
//! Each agent is backed by an `LlmClient`; which concrete backend gets built is decided by
//! `model_spec_core::resolve(base_model)`. The catalog (name -> descriptor) is persisted as a
//! single JSON file, rewritten atomically, same as `memory::MemoryStore`.

mod factory;

pub use factory::{AgentBackendFactory, OpenAiCompatibleFactory};

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::budget::BudgetController;
use crate::error::HashiruError;
use crate::llm::LlmClient;
use model_spec_core::AgentType;

/// Persisted description of one agent, minus its live backend instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub base_model: String,
    pub agent_type: AgentType,
    pub system_prompt: String,
    pub description: String,
    pub create_resource_cost: f64,
    pub invoke_resource_cost: f64,
    pub create_expense_cost: f64,
    pub invoke_expense_cost: f64,
}

/// Result of one `ask()` call: the agent's reply plus budget remaining after charging it.
#[derive(Clone, Debug)]
pub struct AskOutcome {
    pub text: String,
    pub resource_remaining: f64,
    pub expense_remaining: f64,
}

struct AgentInstance {
    descriptor: AgentDescriptor,
    client: Arc<dyn LlmClient>,
}

/// Catalog + live instances of created agents, gated by three mode flags.
pub struct AgentRegistry {
    path: PathBuf,
    instances: RwLock<HashMap<String, AgentInstance>>,
    budget: Arc<BudgetController>,
    factory: Arc<dyn AgentBackendFactory>,
    agent_creation_enabled: AtomicBool,
    local_agents_enabled: AtomicBool,
    cloud_agents_enabled: AtomicBool,
}

/// `len(words(text)) / 1_000_000`, the token estimator used to size invoke costs.
fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 / 1_000_000.0
}

impl AgentRegistry {
    /// Loads the catalog from `path` (if present) and reconstructs a backend instance for each
    /// descriptor. A descriptor whose backend fails to construct is logged and skipped, not
    /// deleted.
    pub fn open(
        path: impl Into<PathBuf>,
        budget: Arc<BudgetController>,
        factory: Arc<dyn AgentBackendFactory>,
    ) -> Result<Self, HashiruError> {
        let path = path.into();
        let descriptors: Vec<AgentDescriptor> = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut instances = HashMap::new();
        for descriptor in descriptors {
            match factory.build(descriptor.agent_type, &descriptor.base_model, &descriptor.system_prompt) {
                Ok(client) => {
                    instances.insert(descriptor.name.clone(), AgentInstance { descriptor, client });
                }
                Err(e) => {
                    warn!(agent = %descriptor.name, error = %e, "skipping agent: backend reconstruction failed");
                }
            }
        }

        Ok(Self {
            path,
            instances: RwLock::new(instances),
            budget,
            factory,
            agent_creation_enabled: AtomicBool::new(true),
            local_agents_enabled: AtomicBool::new(true),
            cloud_agents_enabled: AtomicBool::new(true),
        })
    }

    pub fn set_agent_creation_enabled(&self, enabled: bool) {
        self.agent_creation_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_local_agents_enabled(&self, enabled: bool) {
        self.local_agents_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_cloud_agents_enabled(&self, enabled: bool) {
        self.cloud_agents_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn list(&self) -> Vec<AgentDescriptor> {
        self.instances
            .read()
            .unwrap()
            .values()
            .map(|i| i.descriptor.clone())
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip(self, system_prompt, description))]
    pub fn create(
        &self,
        name: &str,
        base_model: &str,
        system_prompt: &str,
        description: &str,
        create_resource_cost: f64,
        invoke_resource_cost: f64,
        create_expense_cost: f64,
        invoke_expense_cost: f64,
    ) -> Result<(), HashiruError> {
        if !self.agent_creation_enabled.load(Ordering::SeqCst) {
            return Err(HashiruError::CreationDisabled);
        }
        if self.instances.read().unwrap().contains_key(name) {
            return Err(HashiruError::AgentExists(name.to_string()));
        }

        let agent_type = model_spec_core::resolve(base_model)
            .map_err(|e| HashiruError::UnsupportedModel(e.0))?;

        self.budget.reserve_resource(create_resource_cost)?;
        if let Err(e) = self.budget.reserve_expense(create_expense_cost) {
            self.budget.refund_resource(create_resource_cost);
            return Err(e);
        }

        let client = match self.factory.build(agent_type, base_model, system_prompt) {
            Ok(client) => client,
            Err(e) => {
                self.budget.refund_resource(create_resource_cost);
                return Err(e);
            }
        };

        let descriptor = AgentDescriptor {
            name: name.to_string(),
            base_model: base_model.to_string(),
            agent_type,
            system_prompt: system_prompt.to_string(),
            description: description.to_string(),
            create_resource_cost,
            invoke_resource_cost,
            create_expense_cost,
            invoke_expense_cost,
        };

        {
            let mut instances = self.instances.write().unwrap();
            instances.insert(name.to_string(), AgentInstance { descriptor, client });
            self.persist_locked(&instances)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, prompt))]
    pub async fn ask(&self, name: &str, prompt: &str) -> Result<AskOutcome, HashiruError> {
        let (descriptor, client) = {
            let instances = self.instances.read().unwrap();
            let instance = instances
                .get(name)
                .ok_or_else(|| HashiruError::AgentNotFound(name.to_string()))?;
            (instance.descriptor.clone(), instance.client.clone())
        };

        let local_ok = self.local_agents_enabled.load(Ordering::SeqCst);
        let cloud_ok = self.cloud_agents_enabled.load(Ordering::SeqCst);
        match descriptor.agent_type {
            AgentType::Local if !local_ok => return Err(HashiruError::InvocationDisabled),
            AgentType::CloudGemini | AgentType::CloudGroq if !cloud_ok => {
                return Err(HashiruError::InvocationDisabled)
            }
            _ => {}
        }

        let input_tokens = estimate_tokens(prompt);
        self.budget.reserve_expense(descriptor.invoke_expense_cost * input_tokens)?;

        let response = client
            .invoke(&[crate::message::Message::user(prompt)])
            .await?;

        let output_tokens = estimate_tokens(&response.content);
        self.budget.reserve_expense(descriptor.invoke_expense_cost * output_tokens)?;

        if descriptor.agent_type == AgentType::Local {
            self.budget.reserve_resource(descriptor.invoke_resource_cost)?;
        }

        Ok(AskOutcome {
            text: response.content,
            resource_remaining: self.budget.remaining_resource(),
            expense_remaining: self.budget.remaining_expense(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&self, name: &str) -> Result<(), HashiruError> {
        let mut instances = self.instances.write().unwrap();
        let instance = instances
            .remove(name)
            .ok_or_else(|| HashiruError::AgentNotFound(name.to_string()))?;
        self.budget.refund_resource(instance.descriptor.create_resource_cost);
        self.persist_locked(&instances)
    }

    fn persist_locked(&self, instances: &HashMap<String, AgentInstance>) -> Result<(), HashiruError> {
        let descriptors: Vec<&AgentDescriptor> = instances.values().map(|i| &i.descriptor).collect();
        Self::write_atomic(&self.path, &descriptors)
    }

    fn write_atomic(path: &Path, descriptors: &[&AgentDescriptor]) -> Result<(), HashiruError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(descriptors)?;
        let tmp_path = path.with_extension("json.tmp");
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(json.as_bytes())?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    struct StubFactory;

    #[async_trait::async_trait]
    impl AgentBackendFactory for StubFactory {
        fn build(
            &self,
            _agent_type: AgentType,
            _base_model: &str,
            _system_prompt: &str,
        ) -> Result<Arc<dyn LlmClient>, HashiruError> {
            Ok(Arc::new(MockLlm::fixed("hello from agent")))
        }
    }

    fn registry(total_expense: f64) -> AgentRegistry {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        std::mem::forget(dir);
        let budget = Arc::new(BudgetController::new(total_expense, 0.0));
        AgentRegistry::open(path, budget, Arc::new(StubFactory)).unwrap()
    }

    #[test]
    fn create_resolves_type_and_persists() {
        let reg = registry(10.0);
        reg.create("helper", "llama3.1", "be helpful", "a helper", 1.0, 0.1, 0.0, 0.0)
            .unwrap();
        assert_eq!(reg.list().len(), 1);
        assert_eq!(reg.list()[0].agent_type, AgentType::Local);
    }

    #[test]
    fn create_duplicate_name_fails() {
        let reg = registry(10.0);
        reg.create("helper", "llama3.1", "p", "d", 0.0, 0.0, 0.0, 0.0).unwrap();
        let err = reg.create("helper", "llama3.1", "p", "d", 0.0, 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, HashiruError::AgentExists(_)));
    }

    #[test]
    fn create_unsupported_model_fails() {
        let reg = registry(10.0);
        let err = reg.create("helper", "gpt-4o", "p", "d", 0.0, 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, HashiruError::UnsupportedModel(_)));
    }

    #[test]
    fn create_disabled_fails() {
        let reg = registry(10.0);
        reg.set_agent_creation_enabled(false);
        let err = reg.create("helper", "llama3.1", "p", "d", 0.0, 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, HashiruError::CreationDisabled));
    }

    #[tokio::test]
    async fn ask_charges_expense_and_returns_text() {
        let reg = registry(10.0);
        reg.create("helper", "gemini-2.0-flash", "p", "d", 0.0, 0.0, 0.0, 1.0).unwrap();
        let outcome = reg.ask("helper", "hi there").await.unwrap();
        assert_eq!(outcome.text, "hello from agent");
        assert!(outcome.expense_remaining < 10.0);
    }

    #[tokio::test]
    async fn ask_missing_agent_errors() {
        let reg = registry(10.0);
        let err = reg.ask("nope", "hi").await.unwrap_err();
        assert!(matches!(err, HashiruError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn ask_gated_by_cloud_agents_flag() {
        let reg = registry(10.0);
        reg.create("cloudy", "gemini-2.0-flash", "p", "d", 0.0, 0.0, 0.0, 0.0).unwrap();
        reg.set_cloud_agents_enabled(false);
        let err = reg.ask("cloudy", "hi").await.unwrap_err();
        assert!(matches!(err, HashiruError::InvocationDisabled));
    }

    #[test]
    fn delete_refunds_resource_budget_and_removes_entry() {
        let reg = registry(10.0);
        reg.create("helper", "llama3.1", "p", "d", 5.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(reg.list().len(), 1);
        reg.delete("helper").unwrap();
        assert!(reg.list().is_empty());
    }

    #[test]
    fn reopen_reconstructs_catalog_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        let budget = Arc::new(BudgetController::new(10.0, 0.0));
        let reg = AgentRegistry::open(&path, budget.clone(), Arc::new(StubFactory)).unwrap();
        reg.create("helper", "llama3.1", "p", "d", 1.0, 0.0, 0.0, 0.0).unwrap();
        drop(reg);

        let reopened = AgentRegistry::open(&path, budget, Arc::new(StubFactory)).unwrap();
        assert_eq!(reopened.list().len(), 1);
        assert_eq!(reopened.list()[0].name, "helper");
    }
}
