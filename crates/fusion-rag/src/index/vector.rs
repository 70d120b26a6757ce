use anyhow::anyhow;
use async_trait::async_trait;
use rayon::prelude::*;
use std::sync::Arc;

use super::sort_by_score;
use crate::embeddings::{cosine_similarity, EmbeddingModel};
use crate::error::{RagError, Result};
use crate::retrieval::Retriever;
use crate::storage::{DocumentStore, StorageContext};
use crate::types::{Node, NodeId, NodeWithScore, QueryBundle};

/// Brute-force in-memory vector index over node embeddings.
pub struct VectorStoreIndex {
    entries: Vec<(NodeId, Vec<f32>)>,
    docstore: Arc<DocumentStore>,
    embed_model: Arc<dyn EmbeddingModel>,
}

impl VectorStoreIndex {
    /// Embed every node (in batches of `batch_size`) and index the vectors.
    pub async fn from_nodes(
        nodes: &[Arc<Node>],
        storage: &StorageContext,
        embed_model: Arc<dyn EmbeddingModel>,
        batch_size: usize,
    ) -> Result<Self> {
        storage.docstore().insert_shared(nodes);

        let mut entries = Vec::with_capacity(nodes.len());
        for batch in nodes.chunks(batch_size.max(1)) {
            let texts: Vec<&str> = batch.iter().map(|n| n.text.as_str()).collect();
            let embeddings = embed_model
                .embed_documents(&texts)
                .await
                .map_err(RagError::Embedding)?;

            if embeddings.len() != batch.len() {
                return Err(RagError::Embedding(anyhow!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for (node, embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != embed_model.dimension() {
                    return Err(RagError::Embedding(anyhow!(
                        "node {} embedded to {} dims, model dimension is {}",
                        node.id,
                        embedding.len(),
                        embed_model.dimension()
                    )));
                }
                entries.push((node.id.clone(), embedding));
            }
        }

        tracing::info!(
            nodes = entries.len(),
            dimension = embed_model.dimension(),
            "Built vector index"
        );

        Ok(Self {
            entries,
            docstore: storage.docstore().clone(),
            embed_model,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_retriever(self: &Arc<Self>, similarity_top_k: usize) -> VectorIndexRetriever {
        VectorIndexRetriever {
            index: self.clone(),
            similarity_top_k,
        }
    }

    /// Top `k` node ids by cosine similarity to `query`.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<(NodeId, f32)>> {
        let dimension = self.embed_model.dimension();
        if query.len() != dimension {
            return Err(RagError::Index(anyhow!(
                "query embedding has {} dims, index has {}",
                query.len(),
                dimension
            )));
        }

        let mut scored: Vec<(NodeId, f32)> = self
            .entries
            .par_iter()
            .map(|(id, embedding)| (id.clone(), cosine_similarity(query, embedding)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Retrieves the `similarity_top_k` nodes closest to the query embedding.
pub struct VectorIndexRetriever {
    index: Arc<VectorStoreIndex>,
    similarity_top_k: usize,
}

#[async_trait]
impl Retriever for VectorIndexRetriever {
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        let embedding = match &query.embedding {
            Some(embedding) => embedding.clone(),
            None => self
                .index
                .embed_model
                .embed_query(&query.embedding_text())
                .await
                .map_err(RagError::Embedding)?,
        };

        let hits = self.index.query(&embedding, self.similarity_top_k)?;
        let mut results: Vec<NodeWithScore> = hits
            .into_iter()
            .filter_map(|(id, score)| {
                self.index
                    .docstore
                    .get_node(&id)
                    .map(|node| NodeWithScore::new(node, score))
            })
            .collect();
        sort_by_score(&mut results);

        tracing::debug!(
            query = %query,
            top_k = self.similarity_top_k,
            hits = results.len(),
            top_score = results.first().map(|r| r.score).unwrap_or(0.0),
            "Vector retrieval"
        );

        Ok(results)
    }

    fn name(&self) -> &'static str {
        "vector"
    }
}
