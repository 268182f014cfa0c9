//! Normalization of reasoning requests coming from hand-edited forms.
//!
//! Only `input` is mandatory. `context` and `maxSteps` degrade to defaults
//! with a warning instead of failing the run.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use genforge_core::GenerationError;

pub use genforge_core::defaults::{DEFAULT_MAX_STEPS, MAX_STEPS_LIMIT};

/// Raw request as submitted: every field is optional and loosely typed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningRequest {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub max_steps: Option<Value>,
}

impl ReasoningRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(Value::from(max_steps));
        self
    }
}

/// A request after validation and defaulting.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub input: String,
    pub context: Map<String, Value>,
    pub max_steps: u32,
    /// Fields that were downgraded to defaults.
    pub warnings: Vec<String>,
}

impl PreparedRequest {
    pub fn prepare(request: &ReasoningRequest, default_max_steps: u32) -> Result<Self, GenerationError> {
        let input = request
            .input
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(GenerationError::InputRequired)?
            .to_string();

        let mut warnings = Vec::new();
        let context = match resolve_context(request.context.as_ref()) {
            Ok(context) => context,
            Err(warning) => {
                warn!(%warning, "Ignoring malformed reasoning context");
                warnings.push(warning);
                Map::new()
            }
        };

        let default_max_steps = default_max_steps.clamp(1, MAX_STEPS_LIMIT);
        let max_steps = match resolve_max_steps(request.max_steps.as_ref()) {
            Ok(Some(n)) => n.clamp(1, u64::from(MAX_STEPS_LIMIT)) as u32,
            Ok(None) => default_max_steps,
            Err(warning) => {
                warn!(%warning, "Ignoring malformed maxSteps");
                warnings.push(warning);
                default_max_steps
            }
        };

        Ok(Self {
            input,
            context,
            max_steps,
            warnings,
        })
    }
}

/// Accepts an object, a JSON string holding an object, or nothing.
fn resolve_context(raw: Option<&Value>) -> Result<Map<String, Value>, String> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!(
                "context must be a JSON object, got {}; using {{}}",
                json_type(&other)
            )),
            Err(e) => Err(format!("context is not valid JSON ({e}); using {{}}")),
        },
        Some(other) => Err(format!(
            "context must be a JSON object, got {}; using {{}}",
            json_type(other)
        )),
    }
}

fn resolve_max_steps(raw: Option<&Value>) -> Result<Option<u64>, String> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("maxSteps must be a positive integer, got {n}")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| format!("maxSteps must be a positive integer, got {s:?}")),
        Some(other) => Err(format!(
            "maxSteps must be a positive integer, got {}",
            json_type(other)
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
