//! Provider traits — the abstractions over the generative and embedding
//! backends.
//!
//! A `GenerativeProvider` turns an assembled prompt into a response string.
//! An `EmbeddingProvider` turns text into fixed-length vectors; its
//! dimensionality is a provider-fixed constant.
//!
//! Implementations: HTTP (OpenAI-compatible endpoints), deterministic
//! in-process variants for tests.

use crate::error::ProviderError;
use async_trait::async_trait;

/// The generative/completion backend.
///
/// `complete` may be slow (seconds to minutes). Callers own the timeout
/// discipline; the agent contract wraps the call in a fixed deadline.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Turn a prompt into a response.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;
}

/// The embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The fixed output dimensionality of this provider.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed a batch of texts, one vector per input.
    ///
    /// Default implementation embeds sequentially.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
