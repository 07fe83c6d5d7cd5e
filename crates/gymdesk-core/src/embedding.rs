//! Embedding Service
//!
//! OpenAI-compatible `/embeddings` client used by knowledge-base search and
//! the batch embedding job. Uses text-embedding-3-small (1536 dimensions).

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::warn;

/// Embedding dimension for text-embedding-3-small
pub const EMBEDDING_DIM: usize = 1536;

/// Shared embedding service for generating vector embeddings
#[derive(Clone)]
pub struct EmbeddingService {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl EmbeddingService {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        }
    }

    /// Generate an embedding for a single text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let resp = self
            .client
            .post(format!("{}/embeddings", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": &self.model,
                "input": text,
                "encoding_format": "float"
            }))
            .send()
            .await
            .context("Embedding request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Embedding API returned {}: {}", status, body);
            anyhow::bail!("Embedding API returned {}", status);
        }

        let json: serde_json::Value = resp.json().await?;
        let vec = parse_embedding(&json)?;

        if vec.len() != EMBEDDING_DIM {
            warn!(
                "Unexpected embedding dimension: {} (expected {})",
                vec.len(),
                EMBEDDING_DIM
            );
            anyhow::bail!("Unexpected embedding dimension: {}", vec.len());
        }

        Ok(vec)
    }
}

fn parse_embedding(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Embedding response missing data[0].embedding"))?;

    Ok(embedding
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_embed_returns_vector() {
        let server = MockServer::start().await;
        let embedding = vec![0.25_f32; EMBEDDING_DIM];
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "opening hours"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": embedding}]
            })))
            .mount(&server)
            .await;

        let service = EmbeddingService::new(&server.uri(), "sk-test", "text-embedding-3-small");
        let vec = service.embed("opening hours").await.unwrap();
        assert_eq!(vec.len(), EMBEDDING_DIM);
        assert_eq!(vec[0], 0.25);
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2]}]
            })))
            .mount(&server)
            .await;

        let service = EmbeddingService::new(&server.uri(), "sk-test", "m");
        assert!(service.embed("x").await.is_err());
    }

    #[tokio::test]
    async fn test_embed_surfaces_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let service = EmbeddingService::new(&server.uri(), "sk-test", "m");
        let err = service.embed("x").await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
