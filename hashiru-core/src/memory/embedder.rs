//! Embedder trait: produces vectors from text for [`crate::memory::MemoryStore`] entries and
//! [`crate::memory::MemoryRetriever`] queries.

use async_trait::async_trait;

use crate::error::HashiruError;

/// Produces fixed-size float vectors from text.
///
/// Implementations must be `Send + Sync` for use from async orchestrator code.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text into a vector of dimension [`Embedder::dimension`], one per input
    /// in the same order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, HashiruError>;

    /// Vector dimension returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;
}
