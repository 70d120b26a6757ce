pub mod config;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod llm;
pub mod processing;
pub mod query_engine;
pub mod rag_engine;
pub mod retrieval;
pub mod storage;
pub mod synthesis;
pub mod types;

// Re-export primary types for convenience
pub use config::RagConfig;
pub use error::{RagError, Result};
pub use query_engine::RetrieverQueryEngine;
pub use rag_engine::{EngineKind, HybridRagEngine, QueryEngines};
pub use retrieval::{fuse, FusionMode, FusionRetriever, Retriever};
pub use synthesis::{Response, ResponseSynthesizer};
pub use types::{Document, Node, NodeId, NodeWithScore, QueryBundle};
