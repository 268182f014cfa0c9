pub mod mock;
pub mod ollama;
pub mod openrouter;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use genforge_core::{LlmProvider, LlmRequest};

/// Registry of LLM providers, looked up by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider by name. A later registration replaces an earlier one.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(name).cloned()
    }

    /// All registered provider names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Chat message in the OpenAI-style shape both HTTP providers speak.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

pub(crate) fn chat_messages(request: &LlmRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: request.system_prompt.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.user_prompt.clone(),
    });
    messages
}

/// Turn a non-2xx response into an error carrying the status and body.
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_body = response.text().await.unwrap_or_default();
    anyhow::bail!("{provider} returned {status}: {error_body}")
}
