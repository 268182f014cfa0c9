use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use genforge_core::{LlmProvider, LlmRequest, LlmResponse};

use super::{chat_messages, ensure_success, ChatMessage};

/// Ollama local model provider.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: "http://localhost:11434".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
    eval_count: Option<u64>,
    prompt_eval_count: Option<u64>,
}

/// Ollama model names carry no provider prefix ("openai/gpt-4o" → "gpt-4o").
fn local_model_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();
        let model = local_model_name(&request.model);

        let body = OllamaChatRequest {
            model,
            messages: chat_messages(request),
            stream: false,
            format: request.json_output.then_some("json"),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        debug!(model = %model, "Sending request to Ollama");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Ollama HTTP request failed")?;
        let response = ensure_success("Ollama", response).await?;

        let chat: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(LlmResponse {
            content: chat.message.content,
            provider: "ollama".to_string(),
            model: model.to_string(),
            tokens_used: chat.eval_count.unwrap_or(0) + chat.prompt_eval_count.unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
