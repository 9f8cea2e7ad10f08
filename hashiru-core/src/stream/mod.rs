//! Streaming event types emitted by the orchestrator's turn loop, so a caller can render a
//! turn incrementally instead of waiting for it to finish.

use tokio::sync::mpsc;

use crate::llm::LlmUsage;
use crate::message::{Conversation, FunctionCall, FunctionResponse};

/// One chunk of streamed assistant text, forwarded from `LlmClient::invoke_stream`.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    pub content: String,
}

/// One event emitted while a turn is in progress.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// Incremental assistant text as it arrives from the backend.
    TextChunk(MessageChunk),
    /// The model requested this call; emitted before dispatch.
    FunctionCallPending(FunctionCall),
    /// A dispatched call finished, with its result.
    FunctionCallDone(FunctionResponse),
    /// Token usage for one completed LLM call.
    Usage(LlmUsage),
    /// Full conversation after the turn's messages were appended; the last event of a turn.
    Snapshot(Conversation),
}

/// Sends `StreamEvent`s to a caller-supplied channel, silently dropping them when no one is
/// listening (non-streaming callers pass `None` and the orchestrator runs the same code path).
#[derive(Clone)]
pub struct StreamWriter {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl StreamWriter {
    pub fn new(tx: Option<mpsc::Sender<StreamEvent>>) -> Self {
        Self { tx }
    }

    pub fn noop() -> Self {
        Self { tx: None }
    }

    pub async fn emit(&self, event: StreamEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_writer_drops_events_silently() {
        let writer = StreamWriter::noop();
        writer.emit(StreamEvent::TextChunk(MessageChunk { content: "hi".into() })).await;
    }

    #[tokio::test]
    async fn writer_forwards_events_to_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let writer = StreamWriter::new(Some(tx));
        writer.emit(StreamEvent::TextChunk(MessageChunk { content: "hi".into() })).await;
        match rx.recv().await {
            Some(StreamEvent::TextChunk(chunk)) => assert_eq!(chunk.content, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
