//! OpenAI Embeddings implementation of [`Embedder`].
//!
//! Uses OpenAI's Embeddings API to generate vector embeddings from text.
//! Supports models like `text-embedding-3-small`, `text-embedding-3-large`, and `text-embedding-ada-002`.
//!
//! **Interaction**: Implements [`Embedder`]; used by [`MemoryRetriever`](crate::memory::MemoryRetriever)
//! for top-k memory search.
//!
//! Requires `OPENAI_API_KEY` environment variable (or custom config).

use async_openai::{
    config::OpenAIConfig,
    types::embeddings::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};

use crate::error::HashiruError;

fn embedding_error(message: impl Into<String>) -> HashiruError {
    HashiruError::BackendError { message: message.into(), retryable: true }
}

/// OpenAI Embeddings client implementing [`Embedder`].
///
/// Generates vector embeddings using OpenAI's API. Default model is `text-embedding-3-small` (1536 dimensions).
///
/// **Interaction**: Implements [`Embedder`]; used by [`MemoryRetriever`](crate::memory::MemoryRetriever).
///
/// # Examples
///
/// ```ignore
/// use hashiru_core::OpenAIEmbedder;
///
/// let embedder = OpenAIEmbedder::new("text-embedding-3-small");
/// let vectors = embedder.embed(&["Hello, world!"]).await?;
/// ```
///
/// # Runtime behaviour
///
/// [`embed`](Embedder::embed) is async and can be awaited directly from async Store methods.
/// Safe to use inside tokio runtime (e.g. from ReAct tools like `remember`).
pub struct OpenAIEmbedder {
    config: OpenAIConfig,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Creates a new OpenAI embedder with the specified model.
    ///
    /// The API key is read from `OPENAI_API_KEY` environment variable.
    ///
    /// # Arguments
    ///
    /// * `model` - The embedding model to use (e.g., "text-embedding-3-small", "text-embedding-ada-002").
    ///
    /// # Supported models and their dimensions:
    ///
    /// - `text-embedding-3-small`: 1536 dimensions (default, cost-effective)
    /// - `text-embedding-3-large`: 3072 dimensions (higher quality)
    /// - `text-embedding-ada-002`: 1536 dimensions (legacy model)
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let embedder = OpenAIEmbedder::new("text-embedding-3-small");
    /// ```
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let dimensions = Self::get_model_dimensions(&model);
        Self {
            config: OpenAIConfig::new(),
            model,
            dimensions,
        }
    }

    /// Creates a new OpenAI embedder with custom configuration.
    ///
    /// Allows specifying a custom API key, base URL, or other OpenAI-compatible provider settings.
    ///
    /// # Arguments
    ///
    /// * `config` - Custom OpenAI configuration (e.g., different API key or base URL).
    /// * `model` - The embedding model to use.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use async_openai::config::OpenAIConfig;
    /// use hashiru_core::OpenAIEmbedder;
    ///
    /// let config = OpenAIConfig::new().with_api_key("sk-...");
    /// let embedder = OpenAIEmbedder::with_config(config, "text-embedding-3-small");
    /// ```
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimensions = Self::get_model_dimensions(&model);
        Self {
            config,
            model,
            dimensions,
        }
    }

    /// Returns the vector dimension for a given model name.
    ///
    /// # Supported models:
    ///
    /// - `text-embedding-3-small`: 1536
    /// - `text-embedding-3-large`: 3072
    /// - `text-embedding-ada-002`: 1536
    fn get_model_dimensions(model: &str) -> usize {
        match model {
            "text-embedding-3-large" => 3072,
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            _ => 1536,
        }
    }

    /// Embeds a single text string.
    ///
    /// This is a convenience method for embedding a single text. For multiple texts,
    /// use [`embed`](Embedder::embed) which can batch multiple requests.
    ///
    /// # Arguments
    ///
    /// * `text` - The text to embed.
    ///
    /// # Returns
    ///
    /// A vector of floats representing the text embedding.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let embedder = OpenAIEmbedder::new("text-embedding-3-small");
    /// let vector = embedder.embed_one("Hello, world!").await?;
    /// ```
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, HashiruError> {
        let client = Client::with_config(self.config.clone());
        let request = CreateEmbeddingRequest {
            input: EmbeddingInput::String(text.to_string()),
            model: self.model.clone(),
            ..Default::default()
        };

        let response = client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| embedding_error(format!("OpenAI API error: {}", e)))?;

        if response.data.is_empty() {
            return Err(embedding_error("No embedding returned"));
        }

        Ok(response.data[0].embedding.clone())
    }
}

#[async_trait::async_trait]
impl crate::memory::Embedder for OpenAIEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, HashiruError> {
        let inputs: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();
        let input = if inputs.len() == 1 {
            EmbeddingInput::String(inputs[0].clone())
        } else {
            EmbeddingInput::StringArray(inputs)
        };

        let request = CreateEmbeddingRequest {
            input,
            model: self.model.clone(),
            ..Default::default()
        };

        let client = Client::with_config(self.config.clone());
        let response = client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| embedding_error(format!("OpenAI API error: {}", e)))?;

        Ok(response.data.into_iter().map(|e| e.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }
}
