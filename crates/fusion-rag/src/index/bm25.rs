use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{self, Schema, Value as TantivyValue, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, ReloadPolicy, TantivyDocument};

use crate::error::{RagError, Result};
use crate::retrieval::Retriever;
use crate::storage::{DocumentStore, StorageContext};
use crate::types::{Node, NodeId, NodeWithScore, QueryBundle};

/// In-RAM Tantivy index over node text, scored with BM25.
pub struct Bm25Index {
    index: Index,
    reader: IndexReader,
    id_field: schema::Field,
    text_field: schema::Field,
    docstore: Arc<DocumentStore>,
}

impl Bm25Index {
    /// `id` is STRING (indexed, not tokenized) so term lookups by id work.
    fn build_schema() -> (Schema, schema::Field, schema::Field) {
        let mut sb = Schema::builder();
        let id_field = sb.add_text_field("id", STRING | STORED);
        let text_field = sb.add_text_field("text", TEXT);
        (sb.build(), id_field, text_field)
    }

    pub fn from_nodes(nodes: &[Arc<Node>], storage: &StorageContext) -> Result<Self> {
        Self::build(nodes, storage).map_err(RagError::Index)
    }

    fn build(nodes: &[Arc<Node>], storage: &StorageContext) -> anyhow::Result<Self> {
        storage.docstore().insert_shared(nodes);

        let (schema, id_field, text_field) = Self::build_schema();
        let index = Index::create_in_ram(schema);

        let mut writer = index
            .writer_with_num_threads(1, 20_000_000)
            .context("Failed to create Tantivy writer")?;
        for node in nodes {
            writer.add_document(doc!(
                id_field => node.id.as_str(),
                text_field => node.text.as_str(),
            ))?;
        }
        writer.commit().context("Tantivy commit failed")?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create Tantivy reader")?;
        reader.reload()?;

        tracing::info!(nodes = nodes.len(), "Built BM25 index");

        Ok(Self {
            index,
            reader,
            id_field,
            text_field,
            docstore: storage.docstore().clone(),
        })
    }

    pub fn as_retriever(self: &Arc<Self>, top_k: usize) -> Bm25Retriever {
        Bm25Retriever {
            index: self.clone(),
            top_k,
        }
    }

    /// Top `k` node ids by BM25 score.
    pub fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<(NodeId, f32)>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);

        // Natural-language queries often contain query-syntax characters
        // (`?`, `'`, `:`); fall back to a phrase-free term query.
        let parsed_query = match query_parser.parse_query(query) {
            Ok(q) => q,
            Err(_) => {
                let cleaned: String = query
                    .chars()
                    .map(|c| if c.is_alphanumeric() { c } else { ' ' })
                    .collect();
                query_parser.parse_query(&cleaned)?
            }
        };

        let top_docs = searcher.search(&parsed_query, &TopDocs::with_limit(k))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc = searcher.doc::<TantivyDocument>(doc_address)?;
            if let Some(id_text) = doc.get_first(self.id_field).and_then(|v| v.as_str()) {
                results.push((NodeId::from(id_text), score));
            }
        }

        Ok(results)
    }
}

/// Keyword-capable retriever backed by [`Bm25Index`].
pub struct Bm25Retriever {
    index: Arc<Bm25Index>,
    top_k: usize,
}

#[async_trait]
impl Retriever for Bm25Retriever {
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        let hits = self
            .index
            .search(&query.query_str, self.top_k)
            .map_err(RagError::Index)?;

        let results: Vec<NodeWithScore> = hits
            .into_iter()
            .filter_map(|(id, score)| {
                self.index
                    .docstore
                    .get_node(&id)
                    .map(|node| NodeWithScore::new(node, score))
            })
            .collect();

        tracing::debug!(query = %query, hits = results.len(), "BM25 retrieval");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "bm25"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(texts: &[(&str, &str)]) -> Arc<Bm25Index> {
        let storage = StorageContext::from_defaults();
        let nodes = storage
            .docstore()
            .add_documents(texts.iter().map(|(id, text)| Node::new(*id, *text)).collect());
        Arc::new(Bm25Index::from_nodes(&nodes, &storage).unwrap())
    }

    #[tokio::test]
    async fn test_bm25_finds_matching_nodes() {
        let index = build(&[
            ("n1", "John Smith's first job was as a paper boy"),
            ("n2", "Weather report for Lisbon, mild and sunny"),
        ]);

        let results = index
            .as_retriever(5)
            .retrieve(&"What is john smith's first job?".into())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id().as_str(), "n1");
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_blank_query_returns_nothing() {
        let index = build(&[("n1", "text")]);
        assert!(index.search("   ", 5).unwrap().is_empty());
    }
}
