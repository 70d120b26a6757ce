use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::retrieval::FusionMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub input_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub similarity_top_k: usize,
    pub fusion_mode: FusionMode,
    /// Query both retrievers at once instead of one after the other
    pub concurrent: bool,
    pub keyword: KeywordConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeywordBackend {
    /// Keyword → node table, scored by number of matched query keywords
    Table,
    /// Tantivy BM25 over node text
    Bm25,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub backend: KeywordBackend,
    pub max_keywords_per_chunk: usize,
    pub max_keywords_per_query: usize,
    pub num_chunks_per_query: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local feature-hashing embedder, no model files or network
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub api_base: String,
    pub dimension: usize,
    pub cache_size: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// No model; answers are the retrieved context
    Disabled,
    /// OpenAI-compatible `/chat/completions` endpoint
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Character budget for the context packed into a single prompt
    pub context_window: usize,
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(RagError::Configuration(msg.to_string()));

        if self.chunking.chunk_size < 50 {
            return invalid("chunking.chunk_size must be >= 50");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return invalid("chunking.chunk_overlap must be < chunk_size");
        }
        if self.retrieval.similarity_top_k == 0 {
            return invalid("retrieval.similarity_top_k must be > 0");
        }
        if self.retrieval.keyword.max_keywords_per_chunk == 0
            || self.retrieval.keyword.max_keywords_per_query == 0
        {
            return invalid("retrieval.keyword keyword limits must be > 0");
        }
        if self.retrieval.keyword.num_chunks_per_query == 0 {
            return invalid("retrieval.keyword.num_chunks_per_query must be > 0");
        }
        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be > 0");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be > 0");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return invalid("llm.temperature must be in [0.0, 2.0]");
        }
        if self.synthesis.context_window < 256 {
            return invalid("synthesis.context_window must be >= 256");
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::Configuration(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            RagError::Configuration(format!("failed to parse config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/fusion-rag/config.json`, used when no path is given.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fusion-rag")
            .join("config.json")
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) if it exists,
    /// otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    tracing::info!("Loading config from {}", default_path.display());
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// API key for external providers: `FUSION_RAG_API_KEY`, then `OPENAI_API_KEY`.
    pub fn api_key() -> Option<String> {
        std::env::var("FUSION_RAG_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("resume"),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
            min_chunk_size: 1,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_top_k: 2,
            fusion_mode: FusionMode::Or,
            concurrent: false,
            keyword: KeywordConfig::default(),
        }
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            backend: KeywordBackend::Table,
            max_keywords_per_chunk: 10,
            max_keywords_per_query: 10,
            num_chunks_per_query: 10,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            dimension: 384,
            cache_size: 1000,
            batch_size: 64,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Disabled,
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.1,
            max_tokens: 512,
            timeout_secs: 120,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            context_window: 12_000,
        }
    }
}
