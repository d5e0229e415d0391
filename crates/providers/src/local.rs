//! In-process providers — deterministic implementations with no network.
//!
//! `StaticProvider` replays canned responses in order. `HashEmbedder` maps
//! text to a bag-of-tokens vector via stable hashing: identical text yields
//! an identical vector, and token overlap yields positive cosine similarity.
//! Both are used by tests and by deployments that run without an embedding
//! service. `UnavailableProvider`/`UnavailableEmbedder` always fail, for
//! exercising degradation paths.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use taskloom_core::error::ProviderError;
use taskloom_core::provider::{EmbeddingProvider, GenerativeProvider};

/// A generative provider that returns configured responses in order.
///
/// Once the list is exhausted the last response repeats.
pub struct StaticProvider {
    responses: Mutex<Vec<String>>,
    last: Mutex<Option<String>>,
}

impl StaticProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            last: Mutex::new(None),
        }
    }

    /// Single fixed response.
    pub fn always(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }
}

#[async_trait]
impl GenerativeProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        let mut responses = self.responses.lock().expect("static provider poisoned");
        let mut last = self.last.lock().expect("static provider poisoned");
        if responses.is_empty() {
            return last
                .clone()
                .ok_or_else(|| ProviderError::NotConfigured("no responses configured".into()));
        }
        let response = responses.remove(0);
        *last = Some(response.clone());
        Ok(response)
    }
}

/// A deterministic bag-of-tokens embedder.
///
/// Each token hashes to a bucket; the bucket counts are L2-normalized.
/// No model weights, no network, fixed dimension.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "dimension must be positive");
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bytes) % self.dimension as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(&token.to_lowercase())] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }
}

/// A generative provider that always fails.
pub struct UnavailableProvider;

#[async_trait]
impl GenerativeProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable("provider is down".into()))
    }
}

/// An embedding provider that always fails.
pub struct UnavailableEmbedder {
    dimension: usize,
}

impl UnavailableEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Unavailable("embedder is down".into()))
    }
}
