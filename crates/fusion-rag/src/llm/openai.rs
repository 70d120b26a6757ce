use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::http::{build_client, parse_json_response, send_error};
use super::LanguageModel;
use crate::config::LlmConfig;

/// Chat-completions client for OpenAI and compatible servers (Ollama, vLLM, OpenRouter...).
pub struct OpenAICompatibleLlm {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAICompatibleLlm {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        let endpoint = format!("{}/chat/completions", config.api_base.trim_end_matches('/'));

        tracing::info!(
            endpoint = %endpoint,
            model = %config.model,
            "Creating OpenAI-compatible LLM client"
        );

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAICompatibleLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            max_tokens = self.max_tokens,
            prompt_len = prompt.len(),
            "Sending chat completion request"
        );

        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": false
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            tracing::error!(endpoint = %self.endpoint, status = %status, error = %error, "API returned error");
            return Err(anyhow!("API error ({}): {}", status, error));
        }

        let result: ChatResponse = parse_json_response(response, &self.endpoint).await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No choices returned from API"))?;

        tracing::debug!("API response received, {} chars", content.len());
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
