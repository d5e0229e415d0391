//! OpenAI-compatible embedding provider.
//!
//! The configured dimension is authoritative: a response whose vectors have
//! any other length is rejected. Silently accepting a changed dimensionality
//! would corrupt every collection built against the old one.

use async_trait::async_trait;
use serde::Deserialize;
use taskloom_core::error::ProviderError;
use taskloom_core::provider::EmbeddingProvider;
use tracing::debug;

/// An OpenAI-compatible embedding provider.
pub struct HttpEmbeddingProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl HttpEmbeddingProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "openai-compat-embeddings".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
            client,
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        debug!(provider = %self.name, count = inputs.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiEmbeddingResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        // Responses come back index-tagged; restore input order.
        let mut data = api_response.data;
        data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(ProviderError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }
}

#[derive(Deserialize)]
struct ApiEmbeddingResponse {
    data: Vec<ApiEmbedding>,
}

#[derive(Deserialize)]
struct ApiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.request(std::slice::from_ref(&text.to_string())).await?;
        vectors.pop().ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "Empty embedding response".into(),
        })
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.request(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_configured_dimension() {
        let provider =
            HttpEmbeddingProvider::new("http://localhost:8080/v1", "key", "model", 384).unwrap();
        assert_eq!(provider.dimension(), 384);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let provider =
            HttpEmbeddingProvider::new("http://127.0.0.1:1/v1", "key", "model", 8).unwrap();
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn embed_many_empty_is_empty() {
        let provider =
            HttpEmbeddingProvider::new("http://127.0.0.1:1/v1", "key", "model", 8).unwrap();
        let vectors = provider.embed_many(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
