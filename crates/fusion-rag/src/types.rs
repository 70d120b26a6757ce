use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque identifier of a content unit, assigned at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum DocumentFormat {
    TXT,
    MD,
    HTML,
    JSON,
    PDF,
    DOCX,
    CSV,
    Code,
    /// Unrecognized extension; only accepted if the content is UTF-8 text
    Other,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" => Self::TXT,
            "md" | "markdown" => Self::MD,
            "html" | "htm" => Self::HTML,
            "json" => Self::JSON,
            "pdf" => Self::PDF,
            "docx" => Self::DOCX,
            "csv" => Self::CSV,
            "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "go" | "java" | "c" | "cpp" | "h"
            | "hpp" | "cs" | "rb" | "php" | "swift" | "kt" | "scala" | "r" | "sql" | "sh"
            | "bash" | "yaml" | "yml" | "toml" | "xml" | "ini" | "cfg" | "conf" => Self::Code,
            _ => Self::Other,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::TXT | Self::Code | Self::Other => "text/plain",
            Self::MD => "text/markdown",
            Self::HTML => "text/html",
            Self::JSON => "application/json",
            Self::PDF => "application/pdf",
            Self::DOCX => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::CSV => "text/csv",
        }
    }
}

/// A source document as produced by a reader, before it is split into nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub format: DocumentFormat,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            format: DocumentFormat::TXT,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// An indexed, addressable chunk of source text ("content unit").
///
/// Nodes are owned by the [`DocumentStore`](crate::storage::DocumentStore) and
/// handed out as `Arc<Node>`; retrievers share them, never copy them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub text: String,
    pub ref_doc_id: Option<String>,
    pub chunk_index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub metadata: HashMap<String, String>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ref_doc_id: None,
            chunk_index: 0,
            start_offset: 0,
            end_offset: 0,
            metadata: HashMap::new(),
        }
    }

    /// Text followed by its metadata header, in the layout handed to the model.
    pub fn content_with_metadata(&self) -> String {
        let mut keys: Vec<&String> = self.metadata.keys().collect();
        keys.sort();
        let header = keys
            .into_iter()
            .filter(|k| k.as_str() == "file_name" || k.as_str() == "file_path")
            .map(|k| format!("{}: {}", k, self.metadata[k]))
            .collect::<Vec<_>>()
            .join("\n");
        if header.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n\n{}", header, self.text)
        }
    }
}

/// A scored reference to a node, produced per query by a retriever.
#[derive(Debug, Clone)]
pub struct NodeWithScore {
    pub node: Arc<Node>,
    pub score: f32,
}

impl NodeWithScore {
    pub fn new(node: Arc<Node>, score: f32) -> Self {
        Self { node, score }
    }

    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    pub fn text(&self) -> &str {
        &self.node.text
    }
}

/// Query text plus optional precomputed parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryBundle {
    pub query_str: String,
    /// Embedding to use instead of embedding `query_str` again.
    pub embedding: Option<Vec<f32>>,
    /// Strings to embed instead of `query_str` when no embedding is given.
    pub custom_embedding_strs: Option<Vec<String>>,
}

impl QueryBundle {
    pub fn new(query_str: impl Into<String>) -> Self {
        Self {
            query_str: query_str.into(),
            ..Self::default()
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text the vector retriever should embed.
    pub fn embedding_text(&self) -> String {
        match &self.custom_embedding_strs {
            Some(strs) if !strs.is_empty() => strs.join("\n"),
            _ => self.query_str.clone(),
        }
    }
}

impl From<&str> for QueryBundle {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl From<String> for QueryBundle {
    fn from(query: String) -> Self {
        Self::new(query)
    }
}

impl fmt::Display for QueryBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_str)
    }
}
