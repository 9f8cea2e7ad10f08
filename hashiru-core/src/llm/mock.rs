//! Deterministic test [`LlmClient`](super::LlmClient), used by orchestrator and registry
//! tests that must not make network calls.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::HashiruError;
use crate::message::{FunctionCall, Message};

use super::{LlmClient, LlmResponse};

/// Returns a fixed, scripted sequence of responses, one per call to `invoke`. The last
/// response repeats once the script is exhausted, so tests need not size the script to the
/// exact number of turns.
pub struct MockLlm {
    script: Mutex<Vec<LlmScriptEntry>>,
    cursor: Mutex<usize>,
}

/// One scripted response: plain text, or text plus function calls.
#[derive(Clone, Debug)]
pub struct LlmScriptEntry {
    pub text: String,
    pub tool_calls: Vec<FunctionCall>,
}

impl LlmScriptEntry {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), tool_calls: vec![] }
    }

    pub fn tool_call(text: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            tool_calls: vec![FunctionCall { name: name.into(), arguments }],
        }
    }
}

impl MockLlm {
    pub fn new(script: Vec<LlmScriptEntry>) -> Self {
        Self { script: Mutex::new(script), cursor: Mutex::new(0) }
    }

    /// A mock that always returns the same fixed text with no function calls.
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(vec![LlmScriptEntry::text(text)])
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _messages: &[Message]) -> Result<LlmResponse, HashiruError> {
        let script = self.script.lock().unwrap();
        let mut cursor = self.cursor.lock().unwrap();
        let idx = (*cursor).min(script.len().saturating_sub(1));
        let entry = script
            .get(idx)
            .cloned()
            .unwrap_or_else(|| LlmScriptEntry::text("No response from the model."));
        if *cursor < script.len() {
            *cursor += 1;
        }
        Ok(LlmResponse {
            content: entry.text,
            tool_calls: entry.tool_calls,
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_in_order_then_repeats_last() {
        let llm = MockLlm::new(vec![
            LlmScriptEntry::text("Thinking..."),
            LlmScriptEntry::tool_call("", "GetBudget", serde_json::json!({})),
        ]);
        let first = llm.invoke(&[]).await.unwrap();
        assert_eq!(first.content, "Thinking...");
        let second = llm.invoke(&[]).await.unwrap();
        assert_eq!(second.tool_calls[0].name, "GetBudget");
        let third = llm.invoke(&[]).await.unwrap();
        assert_eq!(third.tool_calls[0].name, "GetBudget");
    }
}
