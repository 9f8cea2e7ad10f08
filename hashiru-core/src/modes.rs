//! `ModeSet`: the eight feature flags that gate budget, tool, agent, and memory behavior,
//! applied as a single atomic propagation. Changes never affect dispatches already in
//! flight — each flag is read fresh at the moment of the check it gates, never cached by
//! a caller.

use std::sync::Arc;

use crate::agents::AgentRegistry;
use crate::budget::BudgetController;
use crate::orchestrator::Orchestrator;
use crate::tools::ToolRegistry;

/// Desired value for each of the eight flags. `None` leaves that flag unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModeSet {
    pub enable_resource_budget: Option<bool>,
    pub enable_expense_budget: Option<bool>,
    pub enable_tool_creation: Option<bool>,
    pub enable_tool_invocation: Option<bool>,
    pub enable_agent_creation: Option<bool>,
    pub enable_local_agents: Option<bool>,
    pub enable_cloud_agents: Option<bool>,
    pub enable_memory: Option<bool>,
}

/// Applies a `ModeSet` to the four components it governs, in one call so no two-flag window
/// can be observed half-applied within this process's cooperative scheduling model.
pub fn apply_modes(
    modes: ModeSet,
    budget: &Arc<BudgetController>,
    tools: &Arc<ToolRegistry>,
    agents: &Arc<AgentRegistry>,
    orchestrator: &Orchestrator,
) {
    if let Some(v) = modes.enable_resource_budget {
        budget.set_resource_enabled(v);
    }
    if let Some(v) = modes.enable_expense_budget {
        budget.set_expense_enabled(v);
    }
    if let Some(v) = modes.enable_tool_creation {
        tools.set_tool_creation_enabled(v);
    }
    if let Some(v) = modes.enable_tool_invocation {
        tools.set_tool_invocation_enabled(v);
    }
    if let Some(v) = modes.enable_agent_creation {
        agents.set_agent_creation_enabled(v);
    }
    if let Some(v) = modes.enable_local_agents {
        agents.set_local_agents_enabled(v);
    }
    if let Some(v) = modes.enable_cloud_agents {
        agents.set_cloud_agents_enabled(v);
    }
    if let Some(v) = modes.enable_memory {
        orchestrator.set_memory_enabled(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::OpenAiCompatibleFactory;
    use crate::memory::MemoryStore;
    use crate::orchestrator::OpenAiManagerFactory;

    fn harness() -> (Arc<BudgetController>, Arc<ToolRegistry>, Arc<AgentRegistry>, Orchestrator) {
        let budget = Arc::new(BudgetController::new(10.0, 0.0));
        let agents_dir = tempfile::tempdir().unwrap();
        let agents = Arc::new(
            AgentRegistry::open(
                agents_dir.path().join("models.json"),
                budget.clone(),
                Arc::new(OpenAiCompatibleFactory::new()),
            )
            .unwrap(),
        );
        std::mem::forget(agents_dir);
        let memory_dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(MemoryStore::open(memory_dir.path().join("memory.json")).unwrap());
        std::mem::forget(memory_dir);
        let tools_dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(ToolRegistry::new(
            tools_dir.path().join("default"),
            tools_dir.path().join("user"),
            budget.clone(),
            agents.clone(),
            memory,
        ));
        std::mem::forget(tools_dir);
        let manager_factory = Arc::new(OpenAiManagerFactory::new("gpt-4o-mini", "you are HASHIRU"));
        let orchestrator = Orchestrator::new(budget.clone(), tools.clone(), None, manager_factory, 1e-7, 4e-7);
        (budget, tools, agents, orchestrator)
    }

    #[tokio::test]
    async fn disabling_tool_invocation_propagates_to_registry() {
        let (budget, tools, agents, orchestrator) = harness();
        apply_modes(
            ModeSet { enable_tool_invocation: Some(false), ..Default::default() },
            &budget,
            &tools,
            &agents,
            &orchestrator,
        );
        let err = tools.run("GetBudget", serde_json::json!({}), None).await.unwrap_err();
        assert!(matches!(err, crate::error::HashiruError::InvocationDisabled));
    }

    #[test]
    fn unset_flags_leave_state_unchanged() {
        let (budget, tools, agents, orchestrator) = harness();
        budget.set_expense_enabled(false);
        apply_modes(ModeSet::default(), &budget, &tools, &agents, &orchestrator);
        // ModeSet::default() touches nothing; expense gate stays disabled (always-allow) as set above.
        assert!(budget.can_spend_expense(1_000_000.0));
    }
}
