use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Node, NodeId};

/// In-memory owner of every node known to the indices.
#[derive(Default)]
pub struct DocumentStore {
    nodes: RwLock<HashMap<NodeId, Arc<Node>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert nodes, replacing any stored node with the same id.
    /// Returns the shared handles in input order.
    pub fn add_documents(&self, nodes: Vec<Node>) -> Vec<Arc<Node>> {
        let mut store = self.nodes.write();
        let mut added = Vec::with_capacity(nodes.len());
        for node in nodes {
            let node = Arc::new(node);
            if store.insert(node.id.clone(), node.clone()).is_some() {
                tracing::debug!(node_id = %node.id, "Replaced existing node in docstore");
            }
            added.push(node);
        }
        tracing::debug!(added = added.len(), total = store.len(), "Docstore updated");
        added
    }

    /// Register already-shared nodes, keeping any node stored under the same id.
    pub fn insert_shared(&self, nodes: &[Arc<Node>]) {
        let mut store = self.nodes.write();
        for node in nodes {
            store
                .entry(node.id.clone())
                .or_insert_with(|| node.clone());
        }
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup_shares_nodes() {
        let store = DocumentStore::new();
        let added = store.add_documents(vec![Node::new("n1", "alpha"), Node::new("n2", "beta")]);
        assert_eq!(store.len(), 2);

        let fetched = store.get_node(&NodeId::from("n1")).unwrap();
        assert!(Arc::ptr_eq(&fetched, &added[0]));
        assert!(store.get_node(&NodeId::from("missing")).is_none());
    }

    #[test]
    fn test_insert_shared_keeps_existing_node() {
        let store = DocumentStore::new();
        let original = store.add_documents(vec![Node::new("n1", "alpha")]);
        let other = Arc::new(Node::new("n1", "replacement"));
        store.insert_shared(&[other, Arc::new(Node::new("n2", "beta"))]);

        assert_eq!(store.len(), 2);
        let fetched = store.get_node(&NodeId::from("n1")).unwrap();
        assert!(Arc::ptr_eq(&fetched, &original[0]));
    }
}
