//! Indices built over the nodes in a [`StorageContext`](crate::storage::StorageContext).
//!
//! Indices are immutable once built and resolve node ids through the shared
//! docstore, so every retriever hands out the same `Arc<Node>` for a given id.

pub mod bm25;
pub mod keyword;
pub mod vector;

pub use bm25::{Bm25Index, Bm25Retriever};
pub use keyword::{KeywordTableIndex, KeywordTableSimpleRetriever};
pub use vector::{VectorIndexRetriever, VectorStoreIndex};

use std::cmp::Ordering;

use crate::types::NodeWithScore;

/// Descending score, ties broken by ascending node id so results are reproducible.
pub(crate) fn sort_by_score(nodes: &mut [NodeWithScore]) {
    nodes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id().cmp(b.id()))
    });
}
