//! Turn loop: memory injection, streaming generation, function-call dispatch, and recursion
//! into the next turn until one ends with text and no function calls.

mod factory;

pub use factory::{ManagerClientFactory, OpenAiManagerFactory};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::budget::BudgetController;
use crate::error::HashiruError;
use crate::llm::LlmResponse;
use crate::memory::MemoryRetriever;
use crate::message::{
    Conversation, FunctionResponse, FunctionResult, Message, MessageMetadata, MessageStatus, Role,
};
use crate::stream::{StreamEvent, StreamWriter};
use crate::tools::ToolRegistry;

/// How many times the streaming call is retried on a retryable backend error, with
/// exponential backoff between attempts.
const MAX_STREAM_ATTEMPTS: u32 = 3;

fn word_count(text: &str) -> f64 {
    text.split_whitespace().count() as f64
}

fn thinking(title: impl Into<String>, status: MessageStatus) -> MessageMetadata {
    MessageMetadata::thinking(title, Uuid::new_v4().to_string(), status)
}

/// True for messages the `last user/assistant content` memory-injection query draws from:
/// real user turns, and assistant turns that aren't UI-only thinking bubbles.
fn is_query_source(m: &Message) -> bool {
    matches!(m.role, Role::User) || (m.role == Role::Assistant && m.metadata.is_none())
}

/// Drives one conversation through repeated turns against the manager model, dispatching any
/// function calls the model emits to `ToolRegistry` (which itself routes agent-control calls
/// into `AgentRegistry`).
pub struct Orchestrator {
    budget: Arc<BudgetController>,
    tools: Arc<ToolRegistry>,
    memory_retriever: Option<Arc<MemoryRetriever>>,
    manager_factory: Arc<dyn ManagerClientFactory>,
    memory_enabled: AtomicBool,
    input_rate: f64,
    output_rate: f64,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// `input_rate`/`output_rate` are per-word expense multipliers (e.g. `$0.10/1e6` input
    /// words, `$0.40/1e6` output words). Whitespace word count stands in for a token count,
    /// the same heuristic `AgentRegistry::ask` uses, since no tokenizer is part of the stack.
    pub fn new(
        budget: Arc<BudgetController>,
        tools: Arc<ToolRegistry>,
        memory_retriever: Option<Arc<MemoryRetriever>>,
        manager_factory: Arc<dyn ManagerClientFactory>,
        input_rate: f64,
        output_rate: f64,
    ) -> Self {
        Self {
            budget,
            tools,
            memory_retriever,
            manager_factory,
            memory_enabled: AtomicBool::new(true),
            input_rate,
            output_rate,
            cancel: CancellationToken::new(),
        }
    }

    pub fn set_memory_enabled(&self, enabled: bool) {
        self.memory_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Token a caller can cancel (e.g. on a Ctrl-C or client disconnect) to stop the turn at
    /// its next dispatch checkpoint. Cloned, not consumed: triggering it affects every
    /// in-flight `run`/`run_turn` call on this orchestrator.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs turns until one ends without function calls, appending every message it commits
    /// directly onto `conversation` and emitting a `StreamEvent` for each.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        writer: &StreamWriter,
    ) -> Result<(), HashiruError> {
        loop {
            if !self.run_turn(conversation, writer).await? {
                return Ok(());
            }
        }
    }

    /// Runs one turn: inject memories, generate a reply, commit it, dispatch any function
    /// calls. Returns `Ok(true)` if the turn produced function calls and another turn should
    /// follow, `Ok(false)` if the conversation is done.
    #[tracing::instrument(skip_all, fields(message_count = conversation.messages.len()))]
    async fn run_turn(
        &self,
        conversation: &mut Conversation,
        writer: &StreamWriter,
    ) -> Result<bool, HashiruError> {
        self.inject_memories(conversation, writer).await;

        // History formatting happens inside the manager client: it maps each `Message` to
        // backend-native content and skips thinking bubbles itself.
        let history = conversation.messages.clone();
        let tool_specs = self.tools.list();
        let client = self.manager_factory.build(tool_specs);

        let input_tokens: f64 = history.iter().map(|m| word_count(&m.content)).sum();
        if let Err(e) = self.budget.reserve_expense(self.input_rate * input_tokens) {
            conversation.push(Message::assistant_thinking(
                e.to_string(),
                thinking("Error generating response", MessageStatus::Done),
            ));
            writer.emit(StreamEvent::Snapshot(conversation.clone())).await;
            return Ok(false);
        }

        let response = match self.generate_with_retry(client.as_ref(), &history, writer).await {
            Ok(r) => r,
            Err(e) => {
                conversation.push(Message::assistant_thinking(
                    e.to_string(),
                    thinking("Error generating response", MessageStatus::Done),
                ));
                writer.emit(StreamEvent::Snapshot(conversation.clone())).await;
                return Ok(false);
            }
        };

        let output_tokens = word_count(&response.content);
        // Best-effort: the call already happened, so an exhausted expense budget here is
        // logged, not allowed to fail the turn after the model has already answered.
        if let Err(e) = self.budget.reserve_expense(self.output_rate * output_tokens) {
            warn!(error = %e, "expense budget exceeded charging output tokens");
        }

        if let Some(ref usage) = response.usage {
            writer.emit(StreamEvent::Usage(usage.clone())).await;
        }

        self.close_turn(conversation, writer, &response).await
    }

    async fn inject_memories(&self, conversation: &mut Conversation, writer: &StreamWriter) {
        if !self.memory_enabled.load(Ordering::SeqCst) {
            return;
        }
        let Some(retriever) = self.memory_retriever.as_ref() else {
            return;
        };
        if conversation.is_empty() {
            return;
        }
        if matches!(conversation.messages.last(), Some(m) if m.role == Role::Tool) {
            return;
        }
        let Some(query) = conversation.messages.iter().rev().find(|m| is_query_source(m)) else {
            return;
        };

        let records = retriever.top_k(&query.content, 5, 0.1).await;
        if records.is_empty() {
            return;
        }

        let serialized = serde_json::to_string(&records).unwrap_or_default();
        conversation.push(Message::memories(serialized));
        conversation.push(Message::assistant_thinking(
            "Memories",
            thinking("Memories", MessageStatus::Done),
        ));
        writer.emit(StreamEvent::Snapshot(conversation.clone())).await;
    }

    /// Wraps the manager's streaming call in exponential backoff, retrying only retryable
    /// backend errors, up to `MAX_STREAM_ATTEMPTS` total attempts.
    async fn generate_with_retry(
        &self,
        client: &dyn crate::llm::LlmClient,
        history: &[Message],
        writer: &StreamWriter,
    ) -> Result<LlmResponse, HashiruError> {
        let mut attempt = 0u32;
        loop {
            let (tx, mut rx) = tokio::sync::mpsc::channel(32);
            let drain = async {
                while let Some(chunk) = rx.recv().await {
                    writer.emit(StreamEvent::TextChunk(chunk)).await;
                }
            };
            let (result, ()) =
                tokio::join!(client.invoke_stream(history, Some(tx)), drain);

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt + 1 < MAX_STREAM_ATTEMPTS => {
                    attempt += 1;
                    warn!(attempt, error = %e, "retrying manager stream call");
                    tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Commits the reply, then dispatches any function calls it carried. Checks
    /// `cancellation_token()` before each dispatch: if cancelled once calls are committed but
    /// before their responses exist, synthesizes an error response for every outstanding call,
    /// appends the batched `tool` message, and returns `Err(HashiruError::Cancelled)` so the
    /// conversation never ends with a dangling function call.
    async fn close_turn(
        &self,
        conversation: &mut Conversation,
        writer: &StreamWriter,
        response: &LlmResponse,
    ) -> Result<bool, HashiruError> {
        let has_calls = !response.tool_calls.is_empty();

        if !response.content.is_empty() {
            conversation.push(Message::assistant(response.content.clone()));
        }
        for call in &response.tool_calls {
            conversation.push(Message::function_call(
                serde_json::to_string(call).unwrap_or_default(),
            ));
        }
        if response.content.is_empty() && !has_calls {
            conversation.push(Message::assistant("No response from the model."));
        }
        writer.emit(StreamEvent::Snapshot(conversation.clone())).await;

        if !has_calls {
            return Ok(false);
        }

        let mut responses = Vec::with_capacity(response.tool_calls.len());
        for (i, call) in response.tool_calls.iter().enumerate() {
            if self.cancel.is_cancelled() {
                for outstanding in &response.tool_calls[i..] {
                    responses.push(FunctionResponse {
                        name: outstanding.name.clone(),
                        result: FunctionResult::error("cancelled before dispatch"),
                    });
                }
                conversation.push(Message::tool(serde_json::to_string(&responses).unwrap_or_default()));
                writer.emit(StreamEvent::Snapshot(conversation.clone())).await;
                return Err(HashiruError::Cancelled);
            }

            conversation.push(Message::assistant_thinking(
                format!("Invoking `{}` with `{}`", call.name, call.arguments),
                thinking(format!("Invoking {}", call.name), MessageStatus::Pending),
            ));
            writer.emit(StreamEvent::FunctionCallPending(call.clone())).await;

            let result = match self.tools.run(&call.name, call.arguments.clone(), None).await {
                Ok(value) => serde_json::from_value::<FunctionResult>(value.clone())
                    .unwrap_or_else(|_| FunctionResult::success("ok", Some(value))),
                Err(e) => FunctionResult::error(e.to_string()),
            };

            conversation.push(Message::assistant_thinking(
                serde_json::to_string(&result).unwrap_or_default(),
                thinking(format!("Invoking {}", call.name), MessageStatus::Done),
            ));

            let function_response = FunctionResponse { name: call.name.clone(), result };
            writer
                .emit(StreamEvent::FunctionCallDone(function_response.clone()))
                .await;
            responses.push(function_response);
        }

        conversation.push(Message::tool(serde_json::to_string(&responses).unwrap_or_default()));
        writer.emit(StreamEvent::Snapshot(conversation.clone())).await;

        Ok(true)
    }
}
