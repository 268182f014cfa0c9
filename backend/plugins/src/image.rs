//! Text-to-image plugin against an OpenAI-compatible images endpoint.
//!
//! Image providers answer synchronously, so `submit` always yields
//! `Outcome::Immediate`.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use genforge_core::{GenerationError, GenerationPlugin, Outcome};

use crate::manifest::parse_request;

pub const IMAGE_PLUGIN_ID: &str = "image-generation";

/// Upper bound on images per request.
const MAX_IMAGES: u32 = 4;

#[derive(Debug, Clone)]
pub struct ImageGenerationConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub default_size: String,
}

impl Default for ImageGenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            default_model: "dall-e-3".to_string(),
            default_size: "1024x1024".to_string(),
        }
    }
}

pub struct ImageGenerationPlugin {
    client: Client,
    config: ImageGenerationConfig,
}

impl ImageGenerationPlugin {
    pub fn new(config: ImageGenerationConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    count: Option<u32>,
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ProviderResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    revised_prompt: Option<String>,
}

impl ProviderResponse {
    fn into_result(self) -> Result<serde_json::Value, GenerationError> {
        let revised_prompt = self.data.iter().find_map(|d| d.revised_prompt.clone());
        let urls: Vec<String> = self.data.into_iter().filter_map(|d| d.url).collect();
        if urls.is_empty() {
            return Err(GenerationError::Provider(
                "image provider returned no image urls".into(),
            ));
        }
        Ok(json!({ "imageUrls": urls, "revisedPrompt": revised_prompt }))
    }
}

#[async_trait]
impl GenerationPlugin for ImageGenerationPlugin {
    fn id(&self) -> &str {
        IMAGE_PLUGIN_ID
    }

    fn name(&self) -> &str {
        "Text to Image"
    }

    fn description(&self) -> &str {
        "Generates campaign imagery from a text prompt"
    }

    fn request_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["prompt"],
            "properties": {
                "prompt": { "type": "string" },
                "model": { "type": "string", "default": self.config.default_model },
                "size": { "type": "string", "default": self.config.default_size },
                "count": { "type": "integer", "minimum": 1, "maximum": MAX_IMAGES }
            }
        })
    }

    async fn submit(&self, request: &serde_json::Value) -> Result<Outcome, GenerationError> {
        let request: ImageRequest = parse_request(IMAGE_PLUGIN_ID, request)?;
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("prompt is required".into()));
        }
        let n = request.count.unwrap_or(1);
        if !(1..=MAX_IMAGES).contains(&n) {
            return Err(GenerationError::InvalidRequest(format!(
                "count must be between 1 and {MAX_IMAGES}, got {n}"
            )));
        }

        let body = ProviderRequest {
            model: request.model.as_deref().unwrap_or(&self.config.default_model),
            prompt: &request.prompt,
            n,
            size: request.size.as_deref().unwrap_or(&self.config.default_size),
        };

        debug!(model = %body.model, n, "Sending image generation request");

        let response = self
            .client
            .post(format!("{}/images/generations", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("image generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider(format!(
                "image provider returned {status}: {error_body}"
            )));
        }

        let parsed: ProviderResponse = response
            .json()
            .await
            .context("failed to parse image generation response")?;

        parsed.into_result().map(Outcome::Immediate)
    }
}
