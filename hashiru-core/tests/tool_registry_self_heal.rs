//! Integration tests for ToolRegistry discovery and self-healing: a well-formed tool survives
//! `ToolCreator`, a broken one is deleted and its failure reported to the caller instead of
//! `ToolCreator`'s own success result.

use std::sync::Arc;

use hashiru_core::{AgentRegistry, BudgetController, MemoryStore, OpenAiCompatibleFactory, ToolRegistry};

fn registry() -> (tempfile::TempDir, tempfile::TempDir, ToolRegistry) {
    let default_dir = tempfile::tempdir().unwrap();
    let user_dir = tempfile::tempdir().unwrap();
    let budget = Arc::new(BudgetController::new(100.0, 0.0));

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

    let reg = ToolRegistry::new(default_dir.path(), user_dir.path(), budget, agents, memory);
    (default_dir, user_dir, reg)
}

const WORKING_TOOL: &str = r#"
import json, sys

def describe():
    return {"name": "Echo", "description": "echoes its input", "parameters": {"type": "object", "properties": {}}}

def run(**kwargs):
    return {"status": "success", "message": "ok", "output": kwargs}

if __name__ == "__main__":
    if sys.argv[1] == "describe":
        print(json.dumps(describe()))
    else:
        payload = json.loads(sys.stdin.read() or "{}")
        print(json.dumps(run(**payload)))
"#;

#[tokio::test]
#[ignore = "requires python3 on PATH"]
async fn creating_a_well_formed_tool_makes_it_immediately_callable() {
    let (_d, _u, reg) = registry();
    let result = reg
        .run(
            "ToolCreator",
            serde_json::json!({"name": "Echo", "tool_code": WORKING_TOOL}),
            None,
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "success");
    assert!(reg.list().iter().any(|t| t.name == "Echo"));

    let echoed = reg.run("Echo", serde_json::json!({"x": 1}), None).await.unwrap();
    assert_eq!(echoed["status"], "success");
}

#[tokio::test]
#[ignore = "requires python3 on PATH"]
async fn creating_a_broken_tool_self_heals_by_deleting_the_file_and_reporting_the_load_error() {
    let (_d, user_dir, reg) = registry();
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
    assert!(!user_dir.path().join("Broken.py").exists());
}
