use async_trait::async_trait;
use std::sync::Arc;

use super::{Response, ResponseSynthesizer, REFINE_TEMPLATE, TEXT_QA_TEMPLATE};
use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::types::NodeWithScore;

const SEPARATOR: &str = "\n\n";

/// Pack node texts into as few context blocks as fit in `budget` characters.
/// A node longer than the budget is cut at a char boundary.
pub fn pack_context(nodes: &[NodeWithScore], budget: usize) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();

    for node in nodes {
        let mut text = node.node.content_with_metadata();
        if text.len() > budget {
            let mut cut = budget;
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        if text.trim().is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + SEPARATOR.len() + text.len() > budget {
            blocks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(SEPARATOR);
        }
        current.push_str(&text);
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Answers from the first packed block, then refines the answer with each
/// remaining block.
pub struct CompactSynthesizer {
    llm: Arc<dyn LanguageModel>,
    context_window: usize,
}

impl CompactSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>, context_window: usize) -> Self {
        Self {
            llm,
            context_window,
        }
    }
}

#[async_trait]
impl ResponseSynthesizer for CompactSynthesizer {
    async fn synthesize(&self, query: &str, nodes: Vec<NodeWithScore>) -> Result<Response> {
        let blocks = pack_context(&nodes, self.context_window);
        if blocks.is_empty() {
            return Ok(Response::empty());
        }

        let mut answer: Option<String> = None;
        for (i, block) in blocks.iter().enumerate() {
            let prompt = match &answer {
                None => TEXT_QA_TEMPLATE
                    .replace("{context_str}", block)
                    .replace("{query_str}", query),
                Some(existing) => REFINE_TEMPLATE
                    .replace("{context_str}", block)
                    .replace("{existing_answer}", existing)
                    .replace("{query_str}", query),
            };

            let completion = self
                .llm
                .complete(&prompt)
                .await
                .map_err(RagError::Synthesis)?;
            tracing::debug!(
                block = i,
                blocks = blocks.len(),
                model = self.llm.model_name(),
                "Synthesis step complete"
            );
            answer = Some(completion.trim().to_string());
        }

        Ok(Response {
            response: answer.unwrap_or_default(),
            source_nodes: nodes,
        })
    }
}

/// Used when no model is configured: the answer is the retrieved context
/// itself, every packed block of it.
pub struct ContextOnlySynthesizer {
    context_window: usize,
}

impl ContextOnlySynthesizer {
    pub fn new(context_window: usize) -> Self {
        Self { context_window }
    }
}

#[async_trait]
impl ResponseSynthesizer for ContextOnlySynthesizer {
    async fn synthesize(&self, _query: &str, nodes: Vec<NodeWithScore>) -> Result<Response> {
        let blocks = pack_context(&nodes, self.context_window);
        if blocks.is_empty() {
            return Ok(Response::empty());
        }
        Ok(Response {
            response: blocks.join(SEPARATOR),
            source_nodes: nodes,
        })
    }
}
