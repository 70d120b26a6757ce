//! End-to-end pipeline: load a directory, split it into nodes, build a vector
//! index and a keyword index over the same nodes, and expose one query engine
//! per retriever plus one over their fusion.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{KeywordBackend, RagConfig};
use crate::embeddings::build_embedding_model;
use crate::error::{RagError, Result};
use crate::index::{Bm25Index, KeywordTableIndex, VectorStoreIndex};
use crate::processing::{SentenceSplitter, SimpleDirectoryReader};
use crate::query_engine::RetrieverQueryEngine;
use crate::retrieval::{FusionRetriever, Retriever};
use crate::storage::StorageContext;
use crate::synthesis::{get_response_synthesizer, Response, ResponseSynthesizer};
use crate::types::{Document, Node};

/// Which query engine to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineKind {
    Vector,
    Keyword,
    Fusion,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Keyword => "keyword",
            Self::Fusion => "fusion",
        }
    }
}

impl FromStr for EngineKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vector" => Ok(Self::Vector),
            "keyword" => Ok(Self::Keyword),
            "fusion" => Ok(Self::Fusion),
            other => Err(RagError::Configuration(format!(
                "unknown engine '{}', expected vector, keyword or fusion",
                other
            ))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword side of the pipeline.
pub enum KeywordIndex {
    Table(Arc<KeywordTableIndex>),
    Bm25(Arc<Bm25Index>),
}

impl KeywordIndex {
    pub fn as_retriever(&self, config: &RagConfig) -> Arc<dyn Retriever> {
        match self {
            Self::Table(index) => Arc::new(index.as_retriever()),
            Self::Bm25(index) => {
                Arc::new(index.as_retriever(config.retrieval.keyword.num_chunks_per_query))
            }
        }
    }
}

pub struct Indices {
    pub vector: Arc<VectorStoreIndex>,
    pub keyword: KeywordIndex,
}

/// One engine per retriever, all sharing the same synthesizer.
#[derive(Clone)]
pub struct QueryEngines {
    pub vector: RetrieverQueryEngine,
    pub keyword: RetrieverQueryEngine,
    pub fusion: RetrieverQueryEngine,
}

impl QueryEngines {
    pub fn get(&self, kind: EngineKind) -> &RetrieverQueryEngine {
        match kind {
            EngineKind::Vector => &self.vector,
            EngineKind::Keyword => &self.keyword,
            EngineKind::Fusion => &self.fusion,
        }
    }
}

pub fn load_documents(input_dir: &Path) -> Result<Vec<Document>> {
    SimpleDirectoryReader::new(input_dir).load_data()
}

/// Register nodes in a fresh docstore. The returned handles are the ones
/// every index shares.
pub fn initialize_storage_context(nodes: Vec<Node>) -> (StorageContext, Vec<Arc<Node>>) {
    let storage = StorageContext::from_defaults();
    let shared = storage.docstore().add_documents(nodes);
    (storage, shared)
}

pub async fn create_indices(
    nodes: &[Arc<Node>],
    storage: &StorageContext,
    config: &RagConfig,
) -> Result<Indices> {
    let embed_model = build_embedding_model(&config.embedding)?;
    let vector = Arc::new(
        VectorStoreIndex::from_nodes(nodes, storage, embed_model, config.embedding.batch_size)
            .await?,
    );

    let keyword = match config.retrieval.keyword.backend {
        KeywordBackend::Table => KeywordIndex::Table(Arc::new(KeywordTableIndex::from_nodes(
            nodes,
            storage,
            &config.retrieval.keyword,
        ))),
        KeywordBackend::Bm25 => KeywordIndex::Bm25(Arc::new(Bm25Index::from_nodes(nodes, storage)?)),
    };

    Ok(Indices { vector, keyword })
}

pub fn create_query_engines(
    indices: &Indices,
    config: &RagConfig,
    synthesizer: Arc<dyn ResponseSynthesizer>,
) -> QueryEngines {
    let vector_retriever: Arc<dyn Retriever> =
        Arc::new(indices.vector.as_retriever(config.retrieval.similarity_top_k));
    let keyword_retriever = indices.keyword.as_retriever(config);

    let fusion_retriever = FusionRetriever::new(
        vector_retriever.clone(),
        keyword_retriever.clone(),
        config.retrieval.fusion_mode,
    )
    .with_concurrency(config.retrieval.concurrent);

    QueryEngines {
        vector: RetrieverQueryEngine::new(vector_retriever, synthesizer.clone()),
        keyword: RetrieverQueryEngine::new(keyword_retriever, synthesizer.clone()),
        fusion: RetrieverQueryEngine::new(Arc::new(fusion_retriever), synthesizer),
    }
}

/// The assembled pipeline over one input directory.
pub struct HybridRagEngine {
    config: RagConfig,
    storage: StorageContext,
    engines: QueryEngines,
}

impl HybridRagEngine {
    pub async fn from_config(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();

        let documents = load_documents(&config.input_dir)?;
        let nodes = SentenceSplitter::from_config(&config.chunking).get_nodes_from_documents(&documents);
        let (storage, nodes) = initialize_storage_context(nodes);

        let indices = create_indices(&nodes, &storage, &config).await?;
        let synthesizer = get_response_synthesizer(&config)?;
        let engines = create_query_engines(&indices, &config, synthesizer);

        tracing::info!(
            input_dir = %config.input_dir.display(),
            documents = documents.len(),
            nodes = nodes.len(),
            mode = %config.retrieval.fusion_mode,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "RAG engine ready"
        );

        Ok(Self {
            config,
            storage,
            engines,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageContext {
        &self.storage
    }

    pub fn engines(&self) -> &QueryEngines {
        &self.engines
    }

    pub fn node_count(&self) -> usize {
        self.storage.docstore().len()
    }

    pub async fn query(&self, query: &str, kind: EngineKind) -> Result<Response> {
        self.engines.get(kind).query(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::FusionMode;
    use std::fs;
    use std::path::PathBuf;

    const QUERY: &str = "What is john smith's first job?";

    fn resume_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fusion_rag_engine_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("john_smith.txt"),
            "John Smith\nFirst job: paper boy for the Daily News, 1999.\nLater worked as a barista.",
        )
        .unwrap();
        fs::write(dir.join("weather.txt"), "Weather report for Lisbon, mild and sunny.").unwrap();
        dir
    }

    fn config(dir: &Path, mode: FusionMode) -> RagConfig {
        let mut config = RagConfig::default();
        config.input_dir = dir.to_path_buf();
        config.retrieval.fusion_mode = mode;
        config
    }

    fn file_names(response: &Response) -> Vec<String> {
        let mut names: Vec<String> = response.source_files().into_iter().map(String::from).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_or_mode_returns_union() {
        let dir = resume_dir();
        let engine = HybridRagEngine::from_config(config(&dir, FusionMode::Or)).await.unwrap();
        assert_eq!(engine.node_count(), 2);

        let response = engine.query(QUERY, EngineKind::Fusion).await.unwrap();
        // top_k = 2 over two nodes: the vector side already returns both
        assert_eq!(file_names(&response), vec!["john_smith.txt", "weather.txt"]);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_and_mode_keeps_keyword_confirmed_nodes() {
        let dir = resume_dir();
        let engine = HybridRagEngine::from_config(config(&dir, FusionMode::And)).await.unwrap();

        let response = engine.query(QUERY, EngineKind::Fusion).await.unwrap();
        assert_eq!(file_names(&response), vec!["john_smith.txt"]);
        assert!(response.response.contains("paper boy"));

        let keyword = engine.query(QUERY, EngineKind::Keyword).await.unwrap();
        assert_eq!(file_names(&keyword), vec!["john_smith.txt"]);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_bm25_backend_and_mode() {
        let dir = resume_dir();
        let mut config = config(&dir, FusionMode::And);
        config.retrieval.keyword.backend = KeywordBackend::Bm25;
        config.retrieval.concurrent = true;
        let engine = HybridRagEngine::from_config(config).await.unwrap();

        let response = engine.query(QUERY, EngineKind::Fusion).await.unwrap();
        assert_eq!(file_names(&response), vec!["john_smith.txt"]);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_fusion_keyword_scores_win_on_collision() {
        let dir = resume_dir();
        let engine = HybridRagEngine::from_config(config(&dir, FusionMode::And)).await.unwrap();

        let keyword = engine.engines().keyword.retrieve(QUERY).await.unwrap();
        let fused = engine.engines().fusion.retrieve(QUERY).await.unwrap();
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].id(), keyword[0].id());
        assert_eq!(fused[0].score, keyword[0].score);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_input_dir_fails() {
        let dir = std::env::temp_dir().join(format!("fusion_rag_nowhere_{}", uuid::Uuid::new_v4()));
        let result = HybridRagEngine::from_config(config(&dir, FusionMode::Or)).await;
        assert!(matches!(result, Err(RagError::DocumentLoad { .. })));
    }

    #[test]
    fn test_engine_kind_parsing() {
        assert_eq!("fusion".parse::<EngineKind>().unwrap(), EngineKind::Fusion);
        assert!("hybrid".parse::<EngineKind>().unwrap_err().is_configuration());
    }
}
