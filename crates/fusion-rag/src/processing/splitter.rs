use crate::config::ChunkingConfig;
use crate::types::{Document, Node, NodeId};

/// Byte range of one chunk within its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

/// Splits documents into overlapping nodes, preferring to cut at paragraph,
/// sentence, line and word boundaries (in that order).
pub struct SentenceSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
}

impl SentenceSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            min_chunk_size,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(
            config.chunk_size,
            config.chunk_overlap,
            config.min_chunk_size,
        )
    }

    pub fn get_nodes_from_documents(&self, documents: &[Document]) -> Vec<Node> {
        let mut nodes = Vec::new();

        for doc in documents {
            let spans = self.split_spans(&doc.text);
            let doc_nodes = spans.len();

            for (index, span) in spans.into_iter().enumerate() {
                let text = &doc.text[span.start..span.end];
                let mut metadata = doc.metadata.clone();
                if let Some(heading) = extract_heading(text) {
                    metadata.insert("heading".to_string(), heading);
                }

                nodes.push(Node {
                    id: NodeId::generate(),
                    text: text.to_string(),
                    ref_doc_id: Some(doc.id.clone()),
                    chunk_index: index,
                    start_offset: span.start,
                    end_offset: span.end,
                    metadata,
                });
            }

            tracing::debug!(
                doc_id = %doc.id,
                file_name = doc.metadata.get("file_name").map(String::as_str).unwrap_or(""),
                nodes = doc_nodes,
                "Split document into nodes"
            );
        }

        nodes
    }

    /// Chunk boundaries for `text`. Whitespace-only and undersized chunks are dropped.
    pub fn split_spans(&self, text: &str) -> Vec<TextSpan> {
        let mut spans = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let end = snap_down(text, start + self.chunk_size);
            let end = if end <= start {
                // chunk_size smaller than the next char; take the whole char
                snap_up(text, start + 1)
            } else if end < text.len() {
                self.find_break_point(text, start, end)
            } else {
                end
            };

            let chunk = &text[start..end];
            if chunk.trim().len() >= self.min_chunk_size.max(1) {
                spans.push(TextSpan { start, end });
            }

            if end >= text.len() {
                break;
            }

            let len = end - start;
            let step = if len > self.chunk_overlap {
                len - self.chunk_overlap
            } else {
                len
            };
            start = snap_up(text, start + step);
        }

        spans
    }

    fn find_break_point(&self, text: &str, start: usize, preferred_end: usize) -> usize {
        let search_start = snap_up(text, preferred_end.saturating_sub(200).max(start + 1));
        if search_start >= preferred_end {
            return preferred_end;
        }

        let region = &text[search_start..preferred_end];

        if let Some(pos) = region.rfind("\n\n") {
            return search_start + pos + 2;
        }
        if let Some(pos) = region.rfind(". ") {
            return search_start + pos + 2;
        }
        if let Some(pos) = region.rfind(".\n") {
            return search_start + pos + 2;
        }
        if let Some(pos) = region.rfind('\n') {
            return search_start + pos + 1;
        }
        if let Some(pos) = region.rfind(' ') {
            return search_start + pos + 1;
        }

        preferred_end
    }
}

fn extract_heading(text: &str) -> Option<String> {
    let first_line = text.trim_start().lines().next()?;
    if first_line.starts_with('#') {
        let heading = first_line.trim_start_matches('#').trim();
        (!heading.is_empty()).then(|| heading.to_string())
    } else {
        None
    }
}

/// Largest char boundary <= `pos`, clamped to the text length.
fn snap_down(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

/// Smallest char boundary >= `pos`, clamped to the text length.
fn snap_up(text: &str, pos: usize) -> usize {
    let mut p = pos.min(text.len());
    while p < text.len() && !text.is_char_boundary(p) {
        p += 1;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_node() {
        let splitter = SentenceSplitter::new(100, 20, 1);
        let doc = Document::new("John Smith worked at Acme.").with_metadata("file_name", "cv.txt");
        let nodes = splitter.get_nodes_from_documents(&[doc.clone()]);

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, doc.text);
        assert_eq!(nodes[0].ref_doc_id.as_deref(), Some(doc.id.as_str()));
        assert_eq!(nodes[0].metadata.get("file_name").unwrap(), "cv.txt");
    }

    #[test]
    fn test_splits_on_sentence_boundaries_with_overlap() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text = sentence.repeat(20);
        let splitter = SentenceSplitter::new(200, 50, 1);
        let spans = splitter.split_spans(&text);

        assert!(spans.len() > 1);
        for span in &spans {
            assert!(span.end - span.start <= 200);
        }
        for window in spans.windows(2) {
            // Overlapping but always advancing
            assert!(window[1].start > window[0].start);
            assert!(window[1].start < window[0].end);
        }
        // Every chunk except the last ends right after a sentence
        for span in &spans[..spans.len() - 1] {
            assert!(text[span.start..span.end].ends_with(". "));
        }
        assert_eq!(spans.last().unwrap().end, text.len());
    }

    #[test]
    fn test_multibyte_text_never_splits_inside_a_char() {
        let text = "日本語のテキスト".repeat(50);
        let splitter = SentenceSplitter::new(64, 10, 1);
        let spans = splitter.split_spans(&text);

        assert!(!spans.is_empty());
        for span in spans {
            assert!(text.is_char_boundary(span.start));
            assert!(text.is_char_boundary(span.end));
        }
    }

    #[test]
    fn test_whitespace_only_document_yields_no_nodes() {
        let splitter = SentenceSplitter::new(100, 10, 1);
        let nodes = splitter.get_nodes_from_documents(&[Document::new("   \n\n  ")]);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_heading_recorded_in_metadata() {
        let splitter = SentenceSplitter::new(500, 10, 1);
        let nodes = splitter.get_nodes_from_documents(&[Document::new("## Experience\nAcme Corp, 2010")]);
        assert_eq!(nodes[0].metadata.get("heading").unwrap(), "Experience");
    }

    #[test]
    fn test_node_ids_are_unique() {
        let splitter = SentenceSplitter::new(60, 10, 1);
        let text = "word ".repeat(100);
        let nodes = splitter.get_nodes_from_documents(&[Document::new(text)]);
        let ids: std::collections::HashSet<_> = nodes.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids.len(), nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.chunk_index, i);
        }
    }
}
