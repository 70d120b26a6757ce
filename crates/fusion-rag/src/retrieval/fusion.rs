//! Set-based fusion of a vector retriever and a keyword retriever.
//!
//! Results are combined by node id only. When both sides return the same node
//! the keyword result is kept (last writer wins), and the fused output is NOT
//! re-ranked: it comes back in first-seen order, vector results first. Callers
//! that need relevance order must sort downstream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::Retriever;
use crate::error::{RagError, Result};
use crate::types::{NodeId, NodeWithScore, QueryBundle};

/// How the two result sets are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FusionMode {
    /// Intersection: only nodes returned by both retrievers
    And,
    /// Union: nodes returned by either retriever
    Or,
}

impl FusionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl FromStr for FusionMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(RagError::Configuration(format!(
                "invalid fusion mode '{}': expected AND or OR",
                other
            ))),
        }
    }
}

impl fmt::Display for FusionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge two result lists under `mode`.
///
/// Each qualifying node id appears exactly once. On an id collision the
/// keyword item (and its score) replaces the vector item.
pub fn fuse(
    vector_nodes: Vec<NodeWithScore>,
    keyword_nodes: Vec<NodeWithScore>,
    mode: FusionMode,
) -> Vec<NodeWithScore> {
    let vector_ids: HashSet<NodeId> = vector_nodes.iter().map(|n| n.id().clone()).collect();
    let keyword_ids: HashSet<NodeId> = keyword_nodes.iter().map(|n| n.id().clone()).collect();

    let capacity = vector_ids.len() + keyword_ids.len();
    let mut order: Vec<NodeId> = Vec::with_capacity(capacity);
    let mut combined: HashMap<NodeId, NodeWithScore> = HashMap::with_capacity(capacity);

    // V first, then K: keyword entries overwrite vector entries with the same id
    for n in vector_nodes.into_iter().chain(keyword_nodes) {
        let id = n.id().clone();
        if combined.insert(id.clone(), n).is_none() {
            order.push(id);
        }
    }

    order
        .into_iter()
        .filter(|id| match mode {
            FusionMode::And => vector_ids.contains(id) && keyword_ids.contains(id),
            FusionMode::Or => true,
        })
        .filter_map(|id| combined.remove(&id))
        .collect()
}

/// Retriever that queries a vector retriever and a keyword retriever and
/// merges their results with [`fuse`].
pub struct FusionRetriever {
    vector_retriever: Arc<dyn Retriever>,
    keyword_retriever: Arc<dyn Retriever>,
    mode: FusionMode,
    concurrent: bool,
}

impl FusionRetriever {
    pub fn new(
        vector_retriever: Arc<dyn Retriever>,
        keyword_retriever: Arc<dyn Retriever>,
        mode: FusionMode,
    ) -> Self {
        Self {
            vector_retriever,
            keyword_retriever,
            mode,
            concurrent: false,
        }
    }

    /// Build from a textual mode; anything other than `"AND"` or `"OR"` is a
    /// configuration error.
    pub fn from_mode_str(
        vector_retriever: Arc<dyn Retriever>,
        keyword_retriever: Arc<dyn Retriever>,
        mode: &str,
    ) -> Result<Self> {
        let mode = mode.parse::<FusionMode>()?;
        Ok(Self::new(vector_retriever, keyword_retriever, mode))
    }

    /// Drive both upstream calls at the same time. Both are joined before the
    /// merge and the first failure aborts the other.
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn mode(&self) -> FusionMode {
        self.mode
    }

    async fn retrieve_vector(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        self.vector_retriever
            .retrieve(query)
            .await
            .map_err(|e| RagError::upstream("vector", e))
    }

    async fn retrieve_keyword(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        self.keyword_retriever
            .retrieve(query)
            .await
            .map_err(|e| RagError::upstream("keyword", e))
    }
}

#[async_trait]
impl Retriever for FusionRetriever {
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        let (vector_nodes, keyword_nodes) = if self.concurrent {
            tokio::try_join!(self.retrieve_vector(query), self.retrieve_keyword(query))?
        } else {
            let vector_nodes = self.retrieve_vector(query).await?;
            let keyword_nodes = self.retrieve_keyword(query).await?;
            (vector_nodes, keyword_nodes)
        };

        let vector_hits = vector_nodes.len();
        let keyword_hits = keyword_nodes.len();
        let fused = fuse(vector_nodes, keyword_nodes, self.mode);

        tracing::debug!(
            query = %query,
            mode = %self.mode,
            vector_hits,
            keyword_hits,
            fused_count = fused.len(),
            "Fusion retrieval complete"
        );

        Ok(fused)
    }

    fn name(&self) -> &'static str {
        "fusion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Node;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRetriever {
        results: Vec<(&'static str, f32)>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubRetriever {
        fn returning(results: Vec<(&'static str, f32)>) -> Arc<Self> {
            Arc::new(Self {
                results,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                results: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn retrieve(&self, _query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RagError::Index(anyhow::anyhow!("index unavailable")));
            }
            Ok(self
                .results
                .iter()
                .map(|(id, score)| {
                    NodeWithScore::new(Arc::new(Node::new(*id, format!("text of {}", id))), *score)
                })
                .collect())
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn scenario() -> (Arc<StubRetriever>, Arc<StubRetriever>) {
        (
            StubRetriever::returning(vec![("a", 0.9), ("b", 0.5)]),
            StubRetriever::returning(vec![("b", 0.7), ("c", 0.3)]),
        )
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn ids(nodes: &[NodeWithScore]) -> HashSet<String> {
        nodes.iter().map(|n| n.id().to_string()).collect()
    }

    fn score_of(nodes: &[NodeWithScore], id: &str) -> f32 {
        nodes
            .iter()
            .find(|n| n.id().as_str() == id)
            .map(|n| n.score)
            .unwrap()
    }

    #[tokio::test]
    async fn test_or_mode_returns_union() {
        let (v, k) = scenario();
        let retriever = FusionRetriever::new(v, k, FusionMode::Or);
        let nodes = retriever.retrieve(&"query".into()).await.unwrap();

        assert_eq!(nodes.len(), 3);
        assert_eq!(ids(&nodes), set(&["a", "b", "c"]));
        assert_eq!(score_of(&nodes, "b"), 0.7);
        assert_eq!(score_of(&nodes, "a"), 0.9);
    }

    #[tokio::test]
    async fn test_and_mode_returns_intersection() {
        let (v, k) = scenario();
        let retriever = FusionRetriever::new(v, k, FusionMode::And);
        let nodes = retriever.retrieve(&"query".into()).await.unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id().as_str(), "b");
        assert_eq!(nodes[0].score, 0.7);
    }

    #[tokio::test]
    async fn test_empty_inputs_yield_empty_output() {
        for mode in [FusionMode::And, FusionMode::Or] {
            let retriever = FusionRetriever::new(
                StubRetriever::returning(vec![]),
                StubRetriever::returning(vec![]),
                mode,
            );
            let nodes = retriever.retrieve(&"query".into()).await.unwrap();
            assert!(nodes.is_empty());
        }
    }

    #[tokio::test]
    async fn test_one_side_empty() {
        let and = FusionRetriever::new(
            StubRetriever::returning(vec![]),
            StubRetriever::returning(vec![("b", 0.7)]),
            FusionMode::And,
        );
        assert!(and.retrieve(&"query".into()).await.unwrap().is_empty());

        let or = FusionRetriever::new(
            StubRetriever::returning(vec![]),
            StubRetriever::returning(vec![("b", 0.7)]),
            FusionMode::Or,
        );
        let nodes = or.retrieve(&"query".into()).await.unwrap();
        assert_eq!(ids(&nodes), set(&["b"]));
        assert_eq!(score_of(&nodes, "b"), 0.7);

        let vector_only = FusionRetriever::new(
            StubRetriever::returning(vec![("a", 0.9)]),
            StubRetriever::returning(vec![]),
            FusionMode::Or,
        );
        let nodes = vector_only.retrieve(&"query".into()).await.unwrap();
        assert_eq!(ids(&nodes), set(&["a"]));
    }

    #[tokio::test]
    async fn test_repeated_queries_return_same_ids() {
        let (v, k) = scenario();
        let retriever = FusionRetriever::new(v, k, FusionMode::Or);
        let first = retriever.retrieve(&"query".into()).await.unwrap();
        let second = retriever.retrieve(&"query".into()).await.unwrap();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn test_vector_failure_propagates_without_partial_merge() {
        let keyword = StubRetriever::returning(vec![("c", 0.3)]);
        let retriever =
            FusionRetriever::new(StubRetriever::failing(), keyword.clone(), FusionMode::Or);

        let err = retriever.retrieve(&"query".into()).await.unwrap_err();
        match err {
            RagError::UpstreamRetrieval { retriever, source } => {
                assert_eq!(retriever, "vector");
                assert!(matches!(*source, RagError::Index(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Sequential execution stops before the keyword side is queried
        assert_eq!(keyword.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keyword_failure_propagates_concurrently() {
        let retriever = FusionRetriever::new(
            StubRetriever::returning(vec![("a", 0.9)]),
            StubRetriever::failing(),
            FusionMode::Or,
        )
        .with_concurrency(true);

        let err = retriever.retrieve(&"query".into()).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::UpstreamRetrieval {
                retriever: "keyword",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let (v, k) = scenario();
        let sequential = FusionRetriever::new(v.clone(), k.clone(), FusionMode::Or);
        let concurrent = FusionRetriever::new(v, k, FusionMode::Or).with_concurrency(true);

        let a = sequential.retrieve(&"query".into()).await.unwrap();
        let b = concurrent.retrieve(&"query".into()).await.unwrap();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(score_of(&b, "b"), 0.7);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let (v, k) = scenario();
        let result = FusionRetriever::from_mode_str(v, k, "XOR");
        assert!(matches!(result, Err(RagError::Configuration(_))));
    }

    #[test]
    fn test_mode_parsing_is_exact() {
        assert_eq!("AND".parse::<FusionMode>().unwrap(), FusionMode::And);
        assert_eq!("OR".parse::<FusionMode>().unwrap(), FusionMode::Or);
        assert!("or".parse::<FusionMode>().is_err());
        assert!("".parse::<FusionMode>().is_err());
    }

    #[test]
    fn test_fuse_keeps_keyword_score_and_first_seen_order() {
        let node = |id: &str, score: f32| NodeWithScore::new(Arc::new(Node::new(id, "")), score);
        let vector = vec![node("x", 0.1), node("y", 0.99), node("z", 0.5)];
        let keyword = vec![node("z", 2.0), node("w", 1.0), node("y", 1.5)];

        let fused = fuse(vector.clone(), keyword.clone(), FusionMode::Or);
        let order: Vec<&str> = fused.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z", "w"]);
        assert_eq!(score_of(&fused, "y"), 1.5);
        assert_eq!(score_of(&fused, "z"), 2.0);

        let fused = fuse(vector, keyword, FusionMode::And);
        let order: Vec<&str> = fused.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(order, vec!["y", "z"]);
        // Not re-ranked by score
        assert!(fused[0].score < fused[1].score);
    }

    #[test]
    fn test_fuse_no_duplicates_when_upstream_repeats_id() {
        let node = |id: &str, score: f32| NodeWithScore::new(Arc::new(Node::new(id, "")), score);
        let vector = vec![node("a", 0.9), node("a", 0.8)];
        let keyword = vec![node("a", 0.1)];

        let fused = fuse(vector, keyword, FusionMode::Or);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].score, 0.1);
    }
}
