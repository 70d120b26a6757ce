use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::EmbeddingModel;
use crate::llm::http::{build_client, parse_json_response, send_error};

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAIEmbedding {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbedding {
    pub fn new(api_base: &str, model: &str, api_key: String, dimension: usize) -> Result<Self> {
        let client = build_client(60)?;
        let endpoint = format!("{}/embeddings", api_base.trim_end_matches('/'));

        tracing::info!(endpoint = %endpoint, model = %model, "Creating OpenAI embedding client");

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            api_key,
            dimension,
        })
    }

    async fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = json!({
            "model": self.model,
            "input": inputs,
            "dimensions": self.dimension,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            tracing::error!(endpoint = %self.endpoint, status = %status, error = %error, "Embedding API returned error");
            return Err(anyhow!("Embedding API error ({}): {}", status, error));
        }

        let mut parsed: EmbeddingResponse = parse_json_response(response, &self.endpoint).await?;
        if parsed.data.len() != inputs.len() {
            return Err(anyhow!(
                "Embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                inputs.len()
            ));
        }
        parsed.data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(anyhow!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                v.len()
            ));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("Embedding API returned no vectors"))
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
