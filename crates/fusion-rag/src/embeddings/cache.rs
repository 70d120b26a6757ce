use anyhow::Result;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::EmbeddingModel;

/// LRU cache in front of another embedder. Queries and documents are cached
/// under separate keys since some models embed them differently.
pub struct CachedEmbedding {
    inner: Arc<dyn EmbeddingModel>,
    cache: Mutex<LruCache<(bool, String), Vec<f32>>>,
}

impl CachedEmbedding {
    pub fn new(inner: Arc<dyn EmbeddingModel>, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

#[async_trait]
impl EmbeddingModel for CachedEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let key = (true, text.to_string());
        let hit = self.cache.lock().get(&key).cloned();
        if let Some(cached) = hit {
            return Ok(cached);
        }
        let embedding = self.inner.embed_query(text).await?;
        self.cache.lock().put(key, embedding.clone());
        Ok(embedding)
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<usize> = Vec::new();
        {
            let mut cache = self.cache.lock();
            for (i, text) in texts.iter().enumerate() {
                let hit = cache.get(&(false, text.to_string())).cloned();
                if hit.is_none() {
                    missing.push(i);
                }
                results.push(hit);
            }
        }

        if !missing.is_empty() {
            let batch: Vec<&str> = missing.iter().map(|&i| texts[i]).collect();
            let embedded = self.inner.embed_documents(&batch).await?;
            if embedded.len() != batch.len() {
                anyhow::bail!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                );
            }
            let mut cache = self.cache.lock();
            for (&i, embedding) in missing.iter().zip(embedded) {
                cache.put((false, texts[i].to_string()), embedding.clone());
                results[i] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
