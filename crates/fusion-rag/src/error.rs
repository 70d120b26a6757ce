use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by retrievers, indices and the query pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid construction or configuration parameters (e.g. an unknown fusion mode).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// One of the retrievers feeding a fusion failed. No partial result is produced.
    #[error("{retriever} retriever failed: {source}")]
    UpstreamRetrieval {
        retriever: &'static str,
        #[source]
        source: Box<RagError>,
    },

    #[error("failed to load documents from {}: {source:#}", path.display())]
    DocumentLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("embedding failed: {0:#}")]
    Embedding(#[source] anyhow::Error),

    #[error("index error: {0:#}")]
    Index(#[source] anyhow::Error),

    #[error("response synthesis failed: {0:#}")]
    Synthesis(#[source] anyhow::Error),
}

impl RagError {
    pub fn upstream(retriever: &'static str, source: RagError) -> Self {
        Self::UpstreamRetrieval {
            retriever,
            source: Box::new(source),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
