use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use super::sort_by_score;
use crate::config::KeywordConfig;
use crate::error::Result;
use crate::retrieval::Retriever;
use crate::storage::{DocumentStore, StorageContext};
use crate::types::{Node, NodeId, NodeWithScore, QueryBundle};

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "ain", "all", "am", "an", "and", "any",
    "are", "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "couldn", "d", "did", "didn", "do", "does", "doesn", "doing",
    "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn", "has",
    "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him", "himself",
    "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just", "ll", "m",
    "ma", "me", "mightn", "more", "most", "mustn", "my", "myself", "needn", "no", "nor", "not",
    "now", "o", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "re", "s", "same", "shan", "she", "should", "shouldn", "so", "some",
    "such", "t", "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up", "ve",
    "very", "was", "wasn", "we", "were", "weren", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "won", "wouldn", "y", "you", "your", "yours",
    "yourself", "yourselves",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word regex is valid"));

/// Lowercased word tokens (`\w+`) in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Up to `max_keywords` non-stopword tokens, most frequent first
/// (ties keep first-appearance order).
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for (position, token) in tokenize(text).into_iter().enumerate() {
        if STOPWORD_SET.contains(token.as_str()) {
            continue;
        }
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .take(max_keywords)
        .map(|(keyword, _)| keyword)
        .collect()
}

/// Keyword → node table built from each node's most frequent keywords.
pub struct KeywordTableIndex {
    table: HashMap<String, BTreeSet<NodeId>>,
    docstore: Arc<DocumentStore>,
    config: KeywordConfig,
}

impl KeywordTableIndex {
    pub fn from_nodes(nodes: &[Arc<Node>], storage: &StorageContext, config: &KeywordConfig) -> Self {
        storage.docstore().insert_shared(nodes);

        let mut table: HashMap<String, BTreeSet<NodeId>> = HashMap::new();
        for node in nodes {
            for keyword in extract_keywords(&node.text, config.max_keywords_per_chunk) {
                table.entry(keyword).or_default().insert(node.id.clone());
            }
        }

        tracing::info!(
            nodes = nodes.len(),
            keywords = table.len(),
            "Built keyword table index"
        );

        Self {
            table,
            docstore: storage.docstore().clone(),
            config: config.clone(),
        }
    }

    pub fn node_ids_for(&self, keyword: &str) -> Option<&BTreeSet<NodeId>> {
        self.table.get(keyword)
    }

    pub fn as_retriever(self: &Arc<Self>) -> KeywordTableSimpleRetriever {
        KeywordTableSimpleRetriever {
            index: self.clone(),
            max_keywords_per_query: self.config.max_keywords_per_query,
            num_chunks_per_query: self.config.num_chunks_per_query,
        }
    }
}

/// Scores each node by how many query keywords it is indexed under.
pub struct KeywordTableSimpleRetriever {
    index: Arc<KeywordTableIndex>,
    max_keywords_per_query: usize,
    num_chunks_per_query: usize,
}

impl KeywordTableSimpleRetriever {
    pub fn with_num_chunks(mut self, num_chunks_per_query: usize) -> Self {
        self.num_chunks_per_query = num_chunks_per_query;
        self
    }
}

#[async_trait]
impl Retriever for KeywordTableSimpleRetriever {
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        let keywords = extract_keywords(&query.query_str, self.max_keywords_per_query);

        let mut match_counts: HashMap<&NodeId, usize> = HashMap::new();
        let mut matched_keywords = 0;
        for keyword in &keywords {
            if let Some(ids) = self.index.node_ids_for(keyword) {
                matched_keywords += 1;
                for id in ids {
                    *match_counts.entry(id).or_insert(0) += 1;
                }
            }
        }

        let mut results: Vec<NodeWithScore> = match_counts
            .into_iter()
            .filter_map(|(id, count)| {
                self.index
                    .docstore
                    .get_node(id)
                    .map(|node| NodeWithScore::new(node, count as f32))
            })
            .collect();
        sort_by_score(&mut results);
        results.truncate(self.num_chunks_per_query);

        tracing::debug!(
            query = %query,
            keywords = ?keywords,
            matched_keywords,
            hits = results.len(),
            "Keyword table retrieval"
        );

        Ok(results)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(texts: &[(&str, &str)]) -> Arc<KeywordTableIndex> {
        let storage = StorageContext::from_defaults();
        let nodes = storage
            .docstore()
            .add_documents(texts.iter().map(|(id, text)| Node::new(*id, *text)).collect());
        Arc::new(KeywordTableIndex::from_nodes(&nodes, &storage, &KeywordConfig::default()))
    }

    #[test]
    fn test_extract_keywords_drops_stopwords_and_ranks_by_frequency() {
        let keywords = extract_keywords("What is the first job? The job was at a mill, a paper mill.", 10);
        assert_eq!(keywords[0], "job");
        assert_eq!(keywords[1], "mill");
        assert!(!keywords.contains(&"the".to_string()));
        assert!(!keywords.contains(&"what".to_string()));
        assert!(keywords.contains(&"paper".to_string()));
    }

    #[test]
    fn test_extract_keywords_limit() {
        let keywords = extract_keywords("alpha beta gamma delta epsilon", 2);
        assert_eq!(keywords, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_matched_keywords() {
        let index = build(&[
            ("n1", "John Smith first job paper boy"),
            ("n2", "John Smith second job barista"),
            ("n3", "Weather report for Tuesday"),
        ]);
        let retriever = index.as_retriever();
        let results = retriever.retrieve(&"John Smith first job".into()).await.unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
        assert_eq!(results[0].score, 4.0);
        assert_eq!(results[1].score, 3.0);
    }

    #[tokio::test]
    async fn test_unknown_keywords_return_nothing() {
        let index = build(&[("n1", "paper boy")]);
        let results = index.as_retriever().retrieve(&"quantum chromodynamics".into()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_num_chunks_limit() {
        let index = build(&[("n1", "job"), ("n2", "job"), ("n3", "job")]);
        let results = index
            .as_retriever()
            .with_num_chunks(2)
            .retrieve(&"job".into())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id().as_str(), "n1");
    }
}
