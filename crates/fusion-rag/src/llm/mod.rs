//! Language model clients used by response synthesis.
//!
//! Generation itself happens out of process; this module only speaks the
//! OpenAI-compatible chat protocol.

pub mod http;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{LlmConfig, LlmProvider, RagConfig};
use crate::error::RagError;

pub use openai::OpenAICompatibleLlm;

/// A text-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Build the configured model, or `None` when generation is disabled.
pub fn build_language_model(
    config: &LlmConfig,
) -> crate::error::Result<Option<Arc<dyn LanguageModel>>> {
    match config.provider {
        LlmProvider::Disabled => {
            tracing::info!("LLM disabled, answers will be the retrieved context");
            Ok(None)
        }
        LlmProvider::OpenAI => {
            let api_key = RagConfig::api_key().ok_or_else(|| {
                RagError::Configuration(
                    "llm.provider = openai requires FUSION_RAG_API_KEY or OPENAI_API_KEY"
                        .to_string(),
                )
            })?;
            let llm = OpenAICompatibleLlm::new(config, api_key).map_err(RagError::Synthesis)?;
            Ok(Some(Arc::new(llm)))
        }
    }
}
