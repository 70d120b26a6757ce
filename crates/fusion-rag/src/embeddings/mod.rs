pub mod cache;
pub mod hashing;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, EmbeddingProvider, RagConfig};
use crate::error::RagError;

pub use cache::CachedEmbedding;
pub use hashing::HashingEmbedding;
pub use openai::OpenAIEmbedding;

/// Unified embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embed node texts for indexing
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embedding vector dimension
    fn dimension(&self) -> usize;
}

/// Build the configured embedder, wrapped in an LRU cache when `cache_size > 0`.
pub fn build_embedding_model(
    config: &EmbeddingConfig,
) -> crate::error::Result<Arc<dyn EmbeddingModel>> {
    let base: Arc<dyn EmbeddingModel> = match config.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedding::new(config.dimension)),
        EmbeddingProvider::OpenAI => {
            let api_key = RagConfig::api_key().ok_or_else(|| {
                RagError::Configuration(
                    "embedding.provider = openai requires FUSION_RAG_API_KEY or OPENAI_API_KEY"
                        .to_string(),
                )
            })?;
            Arc::new(
                OpenAIEmbedding::new(
                    &config.api_base,
                    &config.model,
                    api_key,
                    config.dimension,
                )
                .map_err(RagError::Embedding)?,
            )
        }
    };

    tracing::info!(
        provider = ?config.provider,
        dimension = config.dimension,
        cache_size = config.cache_size,
        "Embedding model ready"
    );

    Ok(match std::num::NonZeroUsize::new(config.cache_size) {
        Some(capacity) => Arc::new(CachedEmbedding::new(base, capacity)),
        None => base,
    })
}

/// Scale `vec` to unit length; near-zero vectors are left untouched.
pub fn normalize(mut vec: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for v in &mut vec {
            *v /= norm;
        }
    }
    vec
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < 1e-12 || norm_b < 1e-12 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
