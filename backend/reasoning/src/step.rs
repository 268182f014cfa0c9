//! Parsing of a single "think" response from the model.
//!
//! The model is asked for `{"reasoning": ..., "output": ..., "isFinal": bool}`.
//! Models drift from that format, so plain text is accepted too: a line
//! starting with `FINAL ANSWER:` marks completion.

use serde::Deserialize;

const FINAL_MARKER: &str = "final answer:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStep {
    pub reasoning: String,
    pub output: String,
    pub is_final: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepJson {
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    output: String,
    #[serde(default, alias = "final", alias = "done", alias = "is_final")]
    is_final: bool,
}

pub fn parse_step(content: &str) -> ParsedStep {
    let body = strip_code_fence(content.trim());

    if let Some(step) = serde_json::from_str::<StepJson>(body)
        .ok()
        .filter(|s| !(s.reasoning.trim().is_empty() && s.output.trim().is_empty()))
    {
        let output = if step.output.trim().is_empty() {
            step.reasoning.clone()
        } else {
            step.output
        };
        return ParsedStep {
            reasoning: step.reasoning,
            output,
            is_final: step.is_final,
        };
    }

    parse_plain_text(body)
}

fn parse_plain_text(body: &str) -> ParsedStep {
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.to_ascii_lowercase().starts_with(FINAL_MARKER) {
            let marker_start = offset + (line.len() - trimmed.len());
            let answer = body[marker_start + FINAL_MARKER.len()..].trim().to_string();
            return ParsedStep {
                reasoning: body[..marker_start].trim().to_string(),
                output: answer,
                is_final: true,
            };
        }
        offset += line.len();
    }

    ParsedStep {
        reasoning: body.to_string(),
        output: body.to_string(),
        is_final: false,
    }
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
