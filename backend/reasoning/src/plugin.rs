use async_trait::async_trait;
use serde_json::json;

use genforge_core::{GenerationError, GenerationPlugin, Outcome};

use crate::engine::SequentialEngine;
use crate::request::{ReasoningRequest, MAX_STEPS_LIMIT};

pub const REASONING_PLUGIN_ID: &str = "sequential-thinking";

/// Exposes the sequential engine as a generation plugin ("MCP" capability).
///
/// Always answers immediately: the multi-step loop runs inside `submit`.
pub struct SequentialThinkingPlugin {
    engine: SequentialEngine,
}

impl SequentialThinkingPlugin {
    pub fn new(engine: SequentialEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl GenerationPlugin for SequentialThinkingPlugin {
    fn id(&self) -> &str {
        REASONING_PLUGIN_ID
    }

    fn name(&self) -> &str {
        "Sequential Thinking (MCP)"
    }

    fn description(&self) -> &str {
        "Works through a campaign question in bounded reasoning steps"
    }

    fn request_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["input"],
            "properties": {
                "input": { "type": "string", "minLength": 1 },
                "context": {
                    "description": "JSON object, or a string holding one; malformed values are ignored",
                    "type": ["object", "string"],
                    "default": {}
                },
                "maxSteps": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_STEPS_LIMIT,
                    "default": self.engine.config().default_max_steps
                }
            }
        })
    }

    async fn submit(&self, request: &serde_json::Value) -> Result<Outcome, GenerationError> {
        let request: ReasoningRequest = match request {
            serde_json::Value::Object(_) => serde_json::from_value(request.clone())
                .map_err(|e| GenerationError::InvalidRequest(format!("{REASONING_PLUGIN_ID}: {e}")))?,
            serde_json::Value::String(input) => ReasoningRequest::new(input.clone()),
            _ => return Err(GenerationError::InputRequired),
        };

        let result = self.engine.process(&request).await?;
        let value = serde_json::to_value(&result)
            .map_err(|e| GenerationError::Provider(format!("failed to encode reasoning result: {e}")))?;
        Ok(Outcome::Immediate(value))
    }
}
