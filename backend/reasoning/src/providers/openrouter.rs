use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use genforge_core::{LlmProvider, LlmRequest, LlmResponse};

use super::{chat_messages, ensure_success, ChatMessage};

/// OpenRouter.ai chat-completions provider.
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();

        let body = ChatRequest {
            model: request.model.clone(),
            messages: chat_messages(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request
                .json_output
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        debug!(model = %request.model, json = request.json_output, "Sending request to OpenRouter");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenRouter HTTP request failed")?;
        let response = ensure_success("OpenRouter", response).await?;

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenRouter response")?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("OpenRouter returned no choices")?;

        Ok(LlmResponse {
            content,
            provider: "openrouter".to_string(),
            model: request.model.clone(),
            tokens_used: chat.usage.and_then(|u| u.total_tokens).unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
