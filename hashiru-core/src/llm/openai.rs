//! OpenAI Chat Completions client implementing [`LlmClient`] (`ChatOpenAI`).
//!
//! Uses the real OpenAI Chat Completions API. Requires `OPENAI_API_KEY` (or an explicit
//! [`OpenAIConfig`]). Optional tools enable `tool_calls` in the response.
//!
//! # Streaming
//!
//! `invoke_stream()` uses the streaming Chat Completions API and sends [`MessageChunk`]
//! through the provided channel as content deltas arrive; tool call deltas are accumulated
//! by index and assembled into the final `LlmResponse`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use crate::error::HashiruError;
use crate::message::{FunctionCall, Message, Role, ToolSpec};
use crate::stream::MessageChunk;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionTool, ChatCompletionToolChoiceOption,
        ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionObject, ToolChoiceOptions,
    },
    Client,
};

use super::{LlmClient, LlmResponse, LlmUsage, ToolChoiceMode};

/// OpenAI Chat Completions client implementing `LlmClient`.
///
/// Uses `OPENAI_API_KEY` from the environment by default, or an explicit config via
/// [`ChatOpenAI::with_config`]. Tools are set once per client via `with_tools` and offered
/// on every call; the orchestrator rebuilds the client's tool list whenever the registry
/// changes.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    tools: Option<Vec<ToolSpec>>,
    temperature: Option<f32>,
    tool_choice: Option<ToolChoiceMode>,
    system_prompt: Option<String>,
}

impl ChatOpenAI {
    /// Build a client with default config (API key from `OPENAI_API_KEY`).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            tools: None,
            temperature: None,
            tool_choice: None,
            system_prompt: None,
        }
    }

    /// Build a client with a custom config (custom API key, base URL, organization).
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            tools: None,
            temperature: None,
            tool_choice: None,
            system_prompt: None,
        }
    }

    /// Set the system prompt prepended to every request's message list.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Set tools offered to the model (enables `tool_calls` in the response).
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set temperature (0-2, lower is more deterministic).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set tool choice mode (auto, none, required).
    pub fn with_tool_choice(mut self, mode: ToolChoiceMode) -> Self {
        self.tool_choice = Some(mode);
        self
    }

    fn chat_completions_url() -> String {
        let base = std::env::var("OPENAI_BASE_URL")
            .or_else(|_| std::env::var("OPENAI_API_BASE"))
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let base = base.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Convert our backend-neutral `Message` history into OpenAI request messages.
    ///
    /// Thinking bubbles (assistant messages carrying display metadata) are skipped, same as
    /// history formatting does before handing messages to any backend. `Tool` and
    /// `FunctionCall` roles have no native OpenAI counterpart here (we don't thread
    /// `tool_call_id` through `Message`), so they're rendered as labeled plain-text turns;
    /// `Memories` becomes a system turn.
    fn messages_to_request(
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> Vec<ChatCompletionRequestMessage> {
        let system = system_prompt.map(|p| {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(p))
        });
        system
            .into_iter()
            .chain(messages.iter().filter(|m| !m.is_thinking_bubble()).map(|m| match m.role {
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(m.content.as_str()),
                ),
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessage::from(m.content.as_str()),
                ),
                Role::Tool => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(
                        format!("[tool result] {}", m.content).as_str(),
                    ),
                ),
                Role::FunctionCall => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessage::from(
                        format!("[function call] {}", m.content).as_str(),
                    ),
                ),
                Role::Memories => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(
                        format!("Relevant memories:\n{}", m.content).as_str(),
                    ),
                ),
            }))
            .collect()
    }

    fn chat_tools(tools: &[ToolSpec]) -> Vec<ChatCompletionTools> {
        tools
            .iter()
            .map(|t| {
                ChatCompletionTools::Function(ChatCompletionTool {
                    function: FunctionObject {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: Some(t.input_schema.clone()),
                        ..Default::default()
                    },
                })
            })
            .collect()
    }

    fn tool_choice_option(mode: ToolChoiceMode) -> ChatCompletionToolChoiceOption {
        let opt = match mode {
            ToolChoiceMode::Auto => ToolChoiceOptions::Auto,
            ToolChoiceMode::None => ToolChoiceOptions::None,
            ToolChoiceMode::Required => ToolChoiceOptions::Required,
        };
        ChatCompletionToolChoiceOption::Mode(opt)
    }

    fn build_request(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<async_openai::types::chat::CreateChatCompletionRequest, HashiruError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::messages_to_request(self.system_prompt.as_deref(), messages));
        if stream {
            args.stream(true);
        }

        if let Some(ref tools) = self.tools {
            if !tools.is_empty() {
                args.tools(Self::chat_tools(tools));
                args.tool_choice(ChatCompletionToolChoiceOption::Mode(
                    ToolChoiceOptions::Auto,
                ));
            }
        }
        if let Some(t) = self.temperature {
            args.temperature(t);
        }
        if let Some(mode) = self.tool_choice {
            args.tool_choice(Self::tool_choice_option(mode));
        }

        args.build()
            .map_err(|e| HashiruError::BackendError {
                message: format!("OpenAI request build failed: {e}"),
                retryable: false,
            })
    }

    /// Parse a tool call's raw `arguments` JSON string into a `Value`, tolerating malformed
    /// output from the model rather than failing the whole turn.
    fn parse_arguments(raw: &str) -> serde_json::Value {
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({}))
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, HashiruError> {
        let request = self.build_request(messages, false)?;
        let url = Self::chat_completions_url();
        let tools_count = self.tools.as_ref().map(|t| t.len()).unwrap_or(0);
        debug!(
            url = %url,
            model = %self.model,
            message_count = messages.len(),
            tools_count = tools_count,
            "OpenAI chat create"
        );

        let response = self.client.chat().create(request).await.map_err(|e| {
            HashiruError::BackendError {
                message: format!("OpenAI API error: {e}"),
                retryable: true,
            }
        })?;

        if let Ok(js) = serde_json::to_string(&response) {
            trace!(url = %url, response = %js, "OpenAI response body");
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| HashiruError::BackendError {
                message: "OpenAI returned no choices".to_string(),
                retryable: true,
            })?;

        let msg = choice.message;
        let content = msg.content.unwrap_or_default();
        let tool_calls: Vec<FunctionCall> = msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| {
                if let ChatCompletionMessageToolCalls::Function(f) = tc {
                    Some(FunctionCall {
                        name: f.function.name,
                        arguments: Self::parse_arguments(&f.function.arguments),
                    })
                } else {
                    None
                }
            })
            .collect();

        let usage = response.usage.map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse { content, tool_calls, usage })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
    ) -> Result<LlmResponse, HashiruError> {
        let Some(chunk_tx) = chunk_tx else {
            return self.invoke(messages).await;
        };

        let request = self.build_request(messages, true)?;
        let url = Self::chat_completions_url();
        debug!(url = %url, model = %self.model, message_count = messages.len(), "OpenAI chat create_stream");

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| HashiruError::BackendError {
                message: format!("OpenAI stream error: {e}"),
                retryable: true,
            })?;

        let mut full_content = String::new();
        let mut tool_call_map: HashMap<u32, (String, String, String)> = HashMap::new();
        let mut stream_usage: Option<LlmUsage> = None;

        while let Some(result) = stream.next().await {
            let response = result.map_err(|e| HashiruError::BackendError {
                message: format!("OpenAI stream error: {e}"),
                retryable: true,
            })?;

            if let Some(ref u) = response.usage {
                stream_usage = Some(LlmUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                });
            }

            for choice in response.choices {
                let delta = &choice.delta;

                if let Some(ref content) = delta.content {
                    if !content.is_empty() {
                        full_content.push_str(content);
                        let _ = chunk_tx
                            .send(MessageChunk { content: content.clone() })
                            .await;
                    }
                }

                if let Some(ref tool_calls) = delta.tool_calls {
                    for tc in tool_calls {
                        let entry = tool_call_map
                            .entry(tc.index)
                            .or_insert_with(|| (String::new(), String::new(), String::new()));
                        if let Some(ref id) = tc.id {
                            if !id.is_empty() {
                                entry.0 = id.clone();
                            }
                        }
                        if let Some(ref func) = tc.function {
                            if let Some(ref name) = func.name {
                                entry.1.push_str(name);
                            }
                            if let Some(ref args) = func.arguments {
                                entry.2.push_str(args);
                            }
                        }
                    }
                }
            }
        }

        let mut tool_calls: Vec<FunctionCall> = tool_call_map
            .into_iter()
            .map(|(_, (_, name, arguments))| FunctionCall {
                name,
                arguments: Self::parse_arguments(&arguments),
            })
            .collect();
        tool_calls.sort_by(|a, b| a.name.cmp(&b.name));

        trace!(url = %url, content = %full_content, tool_calls = ?tool_calls, usage = ?stream_usage, "OpenAI stream response");

        Ok(LlmResponse { content: full_content, tool_calls, usage: stream_usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_openai_new_creates_client() {
        let _ = ChatOpenAI::new("gpt-4o-mini");
    }

    #[test]
    fn chat_openai_with_config_creates_client() {
        let config = OpenAIConfig::new().with_api_key("test-key");
        let _ = ChatOpenAI::with_config(config, "gpt-4o-mini");
    }

    #[test]
    fn chat_openai_with_tools_and_temperature_builder() {
        let tools = vec![ToolSpec {
            name: "GetBudget".into(),
            description: None,
            input_schema: serde_json::json!({}),
        }];
        let _ = ChatOpenAI::new("gpt-4o-mini")
            .with_tools(tools)
            .with_temperature(0.5);
    }

    #[tokio::test]
    async fn invoke_with_unreachable_base_returns_error() {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base("https://127.0.0.1:1");
        let client = ChatOpenAI::with_config(config, "gpt-4o-mini");
        let messages = [Message::user("Hello")];

        let result = client.invoke(&messages).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn invoke_stream_with_none_channel_delegates_to_invoke() {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base("https://127.0.0.1:1");
        let client = ChatOpenAI::with_config(config, "gpt-4o-mini");
        let messages = [Message::user("Hi")];

        let res_invoke = client.invoke(&messages).await;
        let res_stream = client.invoke_stream(&messages, None).await;

        assert!(res_invoke.is_err());
        assert!(res_stream.is_err());
    }

    #[tokio::test]
    #[ignore = "requires OPENAI_API_KEY; run with: cargo test -p hashiru-core invoke_with_real_api -- --ignored"]
    async fn invoke_with_real_api_returns_ok() {
        std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set for this test");
        let model = std::env::var("MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let client = ChatOpenAI::new(model);
        let messages = [Message::user("Say exactly: ok")];

        let result = client.invoke(&messages).await;

        let response = result.expect("invoke with real API should succeed");
        assert!(!response.content.is_empty() || !response.tool_calls.is_empty());
    }
}
