use anyhow::Result;
use async_trait::async_trait;

use crate::error::GenerationError;
use crate::types::{JobHandle, JobStatus, Outcome};

/// A generation capability invoked through the orchestrator.
///
/// Implementations normalize every provider-specific failure into
/// [`GenerationError::Provider`] (or `InvalidRequest` for bad input) before
/// returning, so nothing downstream branches on provider error shapes.
#[async_trait]
pub trait GenerationPlugin: Send + Sync {
    /// Unique identifier (e.g., "video-generation").
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema describing the request payload this plugin accepts.
    fn request_schema(&self) -> serde_json::Value;

    /// Submit a request. Either answers immediately or hands back a job to poll.
    async fn submit(&self, request: &serde_json::Value) -> Result<Outcome, GenerationError>;

    /// Query the status of a job previously returned by `submit`.
    ///
    /// Must be idempotent: polling an unchanged job returns the same status.
    /// Plugins that never return `Outcome::Pending` can keep the default.
    async fn poll_status(&self, job: &JobHandle) -> Result<JobStatus, GenerationError> {
        Err(GenerationError::Provider(format!(
            "plugin '{}' does not support job polling (job {})",
            self.id(),
            job.external_id
        )))
    }
}

/// Trait for LLM providers backing the reasoning engine.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openrouter", "ollama").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider to constrain output to a single JSON object.
    pub json_output: bool,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
