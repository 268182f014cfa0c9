//! Image-to-video plugin.
//!
//! Video providers never answer synchronously: `submit` creates a task and
//! returns its id as a [`JobHandle`], and `poll_status` queries that task.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use genforge_core::{GenerationError, GenerationPlugin, JobHandle, JobStatus, Outcome};

use crate::manifest::parse_request;

pub const VIDEO_PLUGIN_ID: &str = "video-generation";

/// Connection settings for the video provider.
#[derive(Debug, Clone)]
pub struct VideoGenerationConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
}

impl Default for VideoGenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.dev.runwayml.com/v1".to_string(),
            default_model: "gen3a_turbo".to_string(),
        }
    }
}

pub struct VideoGenerationPlugin {
    client: Client,
    config: VideoGenerationConfig,
}

impl VideoGenerationPlugin {
    pub fn new(config: VideoGenerationConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

/// Request accepted by `submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub source_image_url: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

impl VideoRequest {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.source_image_url.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "sourceImageUrl is required".into(),
            ));
        }
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("prompt is required".into()));
        }
        if let Some(strength) = self.motion_strength {
            if !(0.0..=1.0).contains(&strength) {
                return Err(GenerationError::InvalidRequest(format!(
                    "motionStrength must be between 0.0 and 1.0, got {strength}"
                )));
            }
        }
        if self.duration_seconds == Some(0) {
            return Err(GenerationError::InvalidRequest(
                "durationSeconds must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct CreateTaskResponse {
    id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaskState {
    #[serde(alias = "pending", alias = "queued", alias = "running", alias = "throttled")]
    Processing,
    Succeeded,
    Failed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatusResponse {
    status: TaskState,
    #[serde(default)]
    result_url: Option<String>,
    #[serde(default)]
    error_detail: Option<String>,
}

impl TaskStatusResponse {
    fn into_job_status(self, job_id: &str) -> JobStatus {
        match self.status {
            TaskState::Processing => JobStatus::Processing,
            TaskState::Succeeded => match self.result_url {
                Some(url) => JobStatus::Succeeded {
                    result: json!({ "resultUrl": url, "jobId": job_id }),
                },
                None => JobStatus::Failed {
                    error_detail: format!("job {job_id} succeeded without a resultUrl"),
                },
            },
            TaskState::Failed => JobStatus::Failed {
                error_detail: self
                    .error_detail
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| format!("job {job_id} failed without detail")),
            },
        }
    }
}

#[async_trait]
impl GenerationPlugin for VideoGenerationPlugin {
    fn id(&self) -> &str {
        VIDEO_PLUGIN_ID
    }

    fn name(&self) -> &str {
        "Image to Video"
    }

    fn description(&self) -> &str {
        "Animates a source image into a short video clip guided by a prompt"
    }

    fn request_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["sourceImageUrl", "prompt"],
            "properties": {
                "sourceImageUrl": { "type": "string", "format": "uri" },
                "prompt": { "type": "string" },
                "model": { "type": "string", "default": self.config.default_model },
                "motionStrength": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "durationSeconds": { "type": "integer", "minimum": 1 }
            }
        })
    }

    async fn submit(&self, request: &serde_json::Value) -> Result<Outcome, GenerationError> {
        let mut request: VideoRequest = parse_request(VIDEO_PLUGIN_ID, request)?;
        request.validate()?;
        if request.model.is_none() {
            request.model = Some(self.config.default_model.clone());
        }

        debug!(model = ?request.model, "Submitting video generation task");

        let response = self
            .client
            .post(format!("{}/tasks", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("video task request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider(format!(
                "video provider returned {status}: {error_body}"
            )));
        }

        let created: CreateTaskResponse = response
            .json()
            .await
            .context("failed to parse video task response")?;

        Ok(Outcome::Pending(JobHandle::new(VIDEO_PLUGIN_ID, created.id)))
    }

    async fn poll_status(&self, job: &JobHandle) -> Result<JobStatus, GenerationError> {
        let response = self
            .client
            .get(format!("{}/tasks/{}", self.config.base_url, job.external_id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .context("video status request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider(format!(
                "video provider returned {status}: {error_body}"
            )));
        }

        let body: TaskStatusResponse = response
            .json()
            .await
            .context("failed to parse video status response")?;

        Ok(body.into_job_status(&job.external_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VideoRequest {
        VideoRequest {
            source_image_url: "https://cdn.example.com/hero.png".into(),
            prompt: "slow pan across the product".into(),
            model: None,
            motion_strength: Some(0.4),
            duration_seconds: Some(5),
        }
    }

    #[test]
    fn validates_motion_strength_range() {
        assert!(request().validate().is_ok());

        let mut r = request();
        r.motion_strength = Some(1.5);
        let err = r.validate().unwrap_err();
        assert!(err.to_string().contains("motionStrength"));

        r.motion_strength = Some(0.0);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn rejects_missing_fields_and_zero_duration() {
        let mut r = request();
        r.source_image_url = " ".into();
        assert!(r.validate().is_err());

        let mut r = request();
        r.duration_seconds = Some(0);
        assert!(r.validate().is_err());
    }

    #[test]
    fn parses_camel_case_request() {
        let r: VideoRequest = parse_request(
            VIDEO_PLUGIN_ID,
            &json!({"sourceImageUrl": "https://a/b.png", "prompt": "zoom", "motionStrength": 0.2}),
        )
        .unwrap();
        assert_eq!(r.motion_strength, Some(0.2));
        assert_eq!(r.duration_seconds, None);
    }

    #[test]
    fn maps_provider_status_to_job_status() {
        let body: TaskStatusResponse = serde_json::from_value(json!({"status": "running"})).unwrap();
        assert_eq!(body.into_job_status("t1"), JobStatus::Processing);

        let body: TaskStatusResponse = serde_json::from_value(
            json!({"status": "succeeded", "resultUrl": "https://x/y.mp4"}),
        )
        .unwrap();
        assert_eq!(
            body.into_job_status("t1"),
            JobStatus::Succeeded {
                result: json!({"resultUrl": "https://x/y.mp4", "jobId": "t1"})
            }
        );

        let body: TaskStatusResponse =
            serde_json::from_value(json!({"status": "failed", "errorDetail": "content policy"}))
                .unwrap();
        assert_eq!(
            body.into_job_status("t1"),
            JobStatus::Failed { error_detail: "content policy".into() }
        );
    }

    #[test]
    fn success_without_url_is_a_failure() {
        let body: TaskStatusResponse =
            serde_json::from_value(json!({"status": "succeeded"})).unwrap();
        assert!(matches!(body.into_job_status("t9"), JobStatus::Failed { .. }));

        let body: TaskStatusResponse =
            serde_json::from_value(json!({"status": "failed", "errorDetail": ""})).unwrap();
        assert_eq!(
            body.into_job_status("t9"),
            JobStatus::Failed { error_detail: "job t9 failed without detail".into() }
        );
    }

    #[tokio::test]
    async fn invalid_request_fails_before_any_http_call() {
        let plugin = VideoGenerationPlugin::new(VideoGenerationConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        });
        let err = plugin
            .submit(&json!({"sourceImageUrl": "https://a/b.png", "prompt": "x", "motionStrength": 2.0}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }
}
