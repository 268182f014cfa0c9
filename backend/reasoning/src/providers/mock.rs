use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use genforge_core::{LlmProvider, LlmRequest, LlmResponse};

/// A mock LLM provider that returns canned responses.
///
/// Scripted responses are served first, in order; afterwards every call gets
/// the fixed response.
pub struct MockProvider {
    name: String,
    fixed_response: Option<String>,
    script: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicU32,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    pub fn with_script<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut script) = self.script.lock() {
            script.extend(responses.into_iter().map(Into::into));
        }
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(req.user_prompt.clone());
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let content = scripted
            .or_else(|| self.fixed_response.clone())
            .unwrap_or_else(|| "Mock response".to_string());

        Ok(LlmResponse {
            content,
            provider: self.name.clone(),
            model: "mock".to_string(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }
}
