use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::retrieval::Retriever;
use crate::synthesis::{Response, ResponseSynthesizer};
use crate::types::{NodeWithScore, QueryBundle};

/// Retrieve with any [`Retriever`], then hand the nodes to a synthesizer.
#[derive(Clone)]
pub struct RetrieverQueryEngine {
    retriever: Arc<dyn Retriever>,
    synthesizer: Arc<dyn ResponseSynthesizer>,
}

impl RetrieverQueryEngine {
    pub fn new(retriever: Arc<dyn Retriever>, synthesizer: Arc<dyn ResponseSynthesizer>) -> Self {
        Self {
            retriever,
            synthesizer,
        }
    }

    pub async fn retrieve(&self, query: impl Into<QueryBundle>) -> Result<Vec<NodeWithScore>> {
        self.retriever.retrieve(&query.into()).await
    }

    pub async fn query(&self, query: impl Into<QueryBundle>) -> Result<Response> {
        let query = query.into();
        let start = Instant::now();

        let nodes = self.retriever.retrieve(&query).await?;
        let retrieved = nodes.len();
        let response = self.synthesizer.synthesize(&query.query_str, nodes).await?;

        tracing::info!(
            retriever = self.retriever.name(),
            nodes = retrieved,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query complete"
        );

        Ok(response)
    }
}
