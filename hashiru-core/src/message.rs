//! Conversation data model: [`Message`], [`Conversation`], [`FunctionCall`]/[`FunctionResponse`],
//! and the stable serialized form for backend-native content ([`ModelContent`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a [`Message`] within a [`Conversation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
    FunctionCall,
    Memories,
}

/// Run/display status attached to an assistant "thinking" message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Done,
}

/// Optional metadata carried by a message. Assistant messages carrying metadata are
/// UI-only "thinking" bubbles and are skipped during history formatting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

impl MessageMetadata {
    pub fn thinking(title: impl Into<String>, id: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            title: Some(title.into()),
            id: Some(id.into()),
            status: Some(status),
        }
    }
}

/// One entry in a [`Conversation`]. Never mutated after append; edits are represented as
/// truncation of the conversation followed by new messages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), metadata: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), metadata: None }
    }

    pub fn assistant_thinking(content: impl Into<String>, metadata: MessageMetadata) -> Self {
        Self { role: Role::Assistant, content: content.into(), metadata: Some(metadata) }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into(), metadata: None }
    }

    pub fn function_call(content: impl Into<String>) -> Self {
        Self { role: Role::FunctionCall, content: content.into(), metadata: None }
    }

    pub fn memories(content: impl Into<String>) -> Self {
        Self { role: Role::Memories, content: content.into(), metadata: None }
    }

    /// Assistant messages carrying metadata are UI-only "thinking" bubbles, skipped during
    /// history formatting.
    pub fn is_thinking_bubble(&self) -> bool {
        self.role == Role::Assistant && self.metadata.is_some()
    }
}

/// Ordered sequence of [`Message`]; owned by one session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A tool or agent invocation emitted by the backend. `arguments` preserves declaration
/// order (backed by an order-preserving JSON map).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// Outcome status of a [`FunctionCall`] dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Error,
}

/// Structured result produced by `ToolRegistry`/`AgentRegistry`, appended as a tool-role
/// message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionResult {
    pub status: CallStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl FunctionResult {
    pub fn success(message: impl Into<String>, output: Option<Value>) -> Self {
        Self { status: CallStatus::Success, message: message.into(), output }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: CallStatus::Error, message: message.into(), output: None }
    }
}

/// One function-response entry: the call it answers, plus its result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub result: FunctionResult,
}

/// Declaration of one callable (tool or agent) offered to the model: name, description,
/// and JSON schema for its arguments. Built by `ToolRegistry::list`/`AgentRegistry::list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Stable tagged union for backend-native content, used instead of a string round-trip of a
/// language-specific representation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    FunctionCall { name: String, args: Value },
    FunctionResponse { name: String, response: Value },
    Bytes { mime_type: String, data: Vec<u8> },
}

/// Backend-neutral content for one turn of conversation history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelContent {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ModelContent {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self { role, parts: vec![ContentPart::Text { text: text.into() }] }
    }
}
