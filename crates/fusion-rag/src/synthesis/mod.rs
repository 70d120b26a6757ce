//! Turning retrieved nodes plus a query into an answer.

pub mod compact;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::llm::build_language_model;
use crate::types::NodeWithScore;

pub use compact::{CompactSynthesizer, ContextOnlySynthesizer};

pub const EMPTY_RESPONSE: &str = "Empty Response";

pub const TEXT_QA_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query_str}\n\
Answer: ";

pub const REFINE_TEMPLATE: &str = "The original query is as follows: {query_str}\n\
We have provided an existing answer: {existing_answer}\n\
We have the opportunity to refine the existing answer (only if needed) with some more context below.\n\
------------\n\
{context_str}\n\
------------\n\
Given the new context, refine the original answer to better answer the query. \
If the context isn't useful, return the original answer.\n\
Refined Answer: ";

/// Final answer and the nodes it was built from.
#[derive(Debug, Clone)]
pub struct Response {
    pub response: String,
    pub source_nodes: Vec<NodeWithScore>,
}

impl Response {
    pub fn empty() -> Self {
        Self {
            response: EMPTY_RESPONSE.to_string(),
            source_nodes: Vec::new(),
        }
    }

    /// Source file names of the nodes backing this answer, deduplicated in order.
    pub fn source_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for node in &self.source_nodes {
            if let Some(name) = node.node.metadata.get("file_name") {
                if !files.contains(&name.as_str()) {
                    files.push(name);
                }
            }
        }
        files
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.response)
    }
}

#[async_trait]
pub trait ResponseSynthesizer: Send + Sync {
    async fn synthesize(&self, query: &str, nodes: Vec<NodeWithScore>) -> Result<Response>;
}

/// Compact-and-refine over the configured model, or the raw context when the
/// model is disabled.
pub fn get_response_synthesizer(config: &RagConfig) -> Result<Arc<dyn ResponseSynthesizer>> {
    Ok(match build_language_model(&config.llm)? {
        Some(llm) => Arc::new(CompactSynthesizer::new(llm, config.synthesis.context_window)),
        None => Arc::new(ContextOnlySynthesizer::new(config.synthesis.context_window)),
    })
}
