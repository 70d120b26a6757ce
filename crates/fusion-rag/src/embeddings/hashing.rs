use anyhow::Result;
use async_trait::async_trait;

use super::{normalize, EmbeddingModel};
use crate::index::keyword::tokenize;

/// Feature-hashing embedder: word unigrams and character trigrams are hashed
/// into a fixed number of signed buckets, then L2-normalized.
///
/// Needs no model files or network, so it backs the offline demo and tests.
/// Similarity is lexical rather than semantic.
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            self.add_feature(&mut vec, token.as_bytes(), 1.0);

            let chars: Vec<char> = format!("#{}#", token).chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vec, trigram.as_bytes(), 0.5);
            }
        }

        normalize(vec)
    }

    fn add_feature(&self, vec: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        // Top bit picks the sign so collisions tend to cancel
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingModel for HashingEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalized() {
        let model = HashingEmbedding::new(128);
        let a = model.embed("first job at the paper mill");
        let b = model.embed("first job at the paper mill");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_related_text_scores_higher() {
        let model = HashingEmbedding::new(256);
        let query = model.embed("first job");
        let related = model.embed("His first job was delivering newspapers");
        let unrelated = model.embed("Quarterly revenue grew in Europe");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let model = HashingEmbedding::new(16);
        let v = model.embed_query("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
