//! Sequential reasoning engine.
//!
//! ```text
//!            ┌──────────────┐  step N   ┌──────────┐
//!  start ──▶ │ AwaitingStep │ ────────▶ │ Stepping │
//!            └──────────────┘           └──────────┘
//!                    ▲   not final && N < max  │
//!                    └─────────────────────────┤
//!                                              │ final || N == max
//!                                              ▼
//!                                        ┌──────────┐
//!                                        │ Complete │
//!                                        └──────────┘
//! ```
//!
//! Each step is one model call fed with the task, the context, and every
//! prior step's output.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use genforge_core::{GenerationError, LlmProvider, LlmRequest};

use crate::request::{PreparedRequest, ReasoningRequest, DEFAULT_MAX_STEPS};
use genforge_core::defaults::{DEFAULT_MAX_TOKENS, DEFAULT_REASONING_MODEL, DEFAULT_TEMPERATURE};
use crate::step::parse_step;

const SYSTEM_PROMPT: &str = "You are a marketing strategist reasoning step by step. \
Each reply is exactly one reasoning step. Respond with a JSON object: \
{\"reasoning\": string, \"output\": string, \"isFinal\": boolean}. \
Set isFinal to true only when output is the complete final answer.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialStepResult {
    /// 1-based, contiguous within a run.
    pub step: u32,
    pub reasoning: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub total_steps: u32,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialRunResult {
    pub final_output: String,
    pub results: Vec<SequentialStepResult>,
    pub metadata: RunMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReasoningState {
    AwaitingStep,
    Stepping,
    Complete,
}

/// Model settings for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub default_max_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_REASONING_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            default_max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

pub struct SequentialEngine {
    provider: Arc<dyn LlmProvider>,
    config: EngineConfig,
}

impl SequentialEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, config: EngineConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run reasoning steps until the model finishes or `maxSteps` is reached.
    pub async fn process(
        &self,
        request: &ReasoningRequest,
    ) -> Result<SequentialRunResult, GenerationError> {
        let started = Instant::now();
        let prepared = PreparedRequest::prepare(request, self.config.default_max_steps)?;

        info!(
            provider = %self.provider.name(),
            max_steps = prepared.max_steps,
            context_keys = prepared.context.len(),
            "Starting sequential reasoning"
        );

        let mut state = ReasoningState::AwaitingStep;
        let mut results: Vec<SequentialStepResult> = Vec::new();
        let mut tokens_used = 0u64;
        let mut step = 0u32;

        while state != ReasoningState::Complete {
            state = match state {
                ReasoningState::AwaitingStep => {
                    step += 1;
                    ReasoningState::Stepping
                }
                ReasoningState::Stepping => {
                    let llm_request = LlmRequest {
                        model: self.config.model.clone(),
                        system_prompt: SYSTEM_PROMPT.to_string(),
                        user_prompt: step_prompt(&prepared, &results, step),
                        max_tokens: self.config.max_tokens,
                        temperature: self.config.temperature,
                        json_output: true,
                    };
                    let response = self.provider.complete(&llm_request).await?;
                    tokens_used += response.tokens_used;

                    let parsed = parse_step(&response.content);
                    debug!(step, is_final = parsed.is_final, "Reasoning step complete");
                    results.push(SequentialStepResult {
                        step,
                        reasoning: parsed.reasoning,
                        output: parsed.output,
                    });

                    if parsed.is_final || step >= prepared.max_steps {
                        ReasoningState::Complete
                    } else {
                        ReasoningState::AwaitingStep
                    }
                }
                ReasoningState::Complete => ReasoningState::Complete,
            };
        }

        let final_output = results.last().map(|r| r.output.clone()).unwrap_or_default();
        let metadata = RunMetadata {
            total_steps: results.len() as u32,
            execution_time_ms: started.elapsed().as_millis() as u64,
            tokens_used,
            warnings: prepared.warnings,
        };

        info!(
            total_steps = metadata.total_steps,
            execution_time_ms = metadata.execution_time_ms,
            "Sequential reasoning complete"
        );

        Ok(SequentialRunResult {
            final_output,
            results,
            metadata,
        })
    }
}

fn step_prompt(request: &PreparedRequest, prior: &[SequentialStepResult], step: u32) -> String {
    let mut prompt = format!("Task:\n{}\n", request.input);

    if !request.context.is_empty() {
        let context = serde_json::to_string_pretty(&Value::Object(request.context.clone()))
            .unwrap_or_else(|_| format!("{:?}", request.context));
        prompt.push_str(&format!("\nContext:\n{context}\n"));
    }

    if !prior.is_empty() {
        prompt.push_str("\nPrevious steps:\n");
        for r in prior {
            prompt.push_str(&format!("Step {}: {}\n", r.step, r.output));
        }
    }

    let remaining = request.max_steps - step;
    prompt.push_str(&format!(
        "\nThis is step {step} of at most {}.",
        request.max_steps
    ));
    if remaining == 0 {
        prompt.push_str(" This is the last step: give the complete final answer.");
    }
    prompt
}
