pub mod fusion;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{NodeWithScore, QueryBundle};

pub use fusion::{fuse, FusionMode, FusionRetriever};

/// Anything that turns a query into scored nodes.
///
/// Implemented by the vector, keyword and fusion retrievers alike, so any of
/// them can sit behind a query engine.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Nodes relevant to `query`. Upstream retrievers return them in
    /// descending relevance; the fusion retriever does not re-sort.
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>>;

    /// Short label used in logs and error context.
    fn name(&self) -> &'static str;
}
