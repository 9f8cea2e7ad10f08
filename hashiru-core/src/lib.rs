//! # hashiru-core
//!
//! HASHIRU's manager loop: a resource- and expense-budgeted orchestrator that dispatches
//! function calls to a self-extending tool registry and a catalog of hireable sub-agents.
//!
//! ## Design principles
//!
//! - **Two budgets, not one.** Every tool/agent create and invoke is metered against both a
//!   resource budget (sized from detected host RAM) and an expense budget (a dollar ceiling),
//!   so the manager can reason about "can I afford this" before acting.
//! - **Tools are data, not code shipped with the binary.** [`tools::ToolRegistry`] discovers
//!   user-authored tool files at runtime and can write new ones itself via `ToolCreator`,
//!   self-healing when a newly authored tool fails to load.
//! - **Agents are catalog entries.** [`agents::AgentRegistry`] persists a JSON catalog of
//!   named, model-backed sub-agents the manager can hire, ask, and fire.
//! - **One fixed turn algorithm**, not a general graph engine: [`orchestrator::Orchestrator`]
//!   runs memory injection, history formatting, streaming generation, and function-call
//!   dispatch as a direct async loop.
//!
//! ## Main modules
//!
//! - [`orchestrator`][]: [`Orchestrator`], the per-turn loop; [`ManagerClientFactory`].
//! - [`tools`][]: [`Tool`] trait, [`ToolRegistry`], built-in special tools, the sidecar protocol.
//! - [`agents`][]: [`AgentRegistry`], [`AgentBackendFactory`].
//! - [`budget`][]: [`BudgetController`].
//! - [`memory`][]: [`MemoryStore`], [`MemoryRetriever`], [`Embedder`], [`OpenAIEmbedder`].
//! - [`llm`][]: [`LlmClient`] trait, [`MockLlm`], [`ChatOpenAI`].
//! - [`message`][]: [`Message`], [`Conversation`], [`FunctionCall`]/[`FunctionResponse`].
//! - [`stream`][]: [`StreamWriter`], [`StreamEvent`] for incremental turn output.
//! - [`modes`][]: [`ModeSet`], [`apply_modes`].
//! - [`config`][]: [`HashiruConfig`].
//! - [`error`][]: [`HashiruError`].

pub mod agents;
pub mod budget;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod message;
pub mod modes;
pub mod orchestrator;
pub mod stream;
pub mod tools;

pub use agents::{AgentBackendFactory, AgentDescriptor, AgentRegistry, AskOutcome, OpenAiCompatibleFactory};
pub use budget::BudgetController;
pub use config::HashiruConfig;
pub use error::{BudgetDimension, HashiruError};
pub use llm::{ChatOpenAI, LlmClient, LlmResponse, LlmUsage, MockLlm, ToolChoiceMode};
pub use memory::{Embedder, MemoryRecord, MemoryRetriever, MemoryStore, OpenAIEmbedder};
pub use message::{
    CallStatus, Conversation, ContentPart, FunctionCall, FunctionResponse, FunctionResult,
    Message, MessageMetadata, MessageStatus, ModelContent, Role, ToolSpec,
};
pub use modes::{apply_modes, ModeSet};
pub use orchestrator::{ManagerClientFactory, OpenAiManagerFactory, Orchestrator};
pub use stream::{MessageChunk, StreamEvent, StreamWriter};
pub use tools::{
    AgentCostManager, AgentCreator, AskAgent, FireAgent, GetAgents, GetBudget, LoadReport,
    MemoryManager, Tool, ToolCallContext, ToolCreator, ToolDeletor, ToolRegistry,
};
