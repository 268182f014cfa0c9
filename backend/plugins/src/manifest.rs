//! Plugin descriptor — the serializable face of a registered plugin.
//!
//! Presentation layers enumerate these to build plugin pickers and request forms.

use genforge_core::{GenerationError, GenerationPlugin};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    /// JSON Schema of the request payload.
    pub request_schema: serde_json::Value,
}

impl PluginDescriptor {
    pub fn of(plugin: &dyn GenerationPlugin) -> Self {
        Self {
            id: plugin.id().to_string(),
            name: plugin.name().to_string(),
            description: plugin.description().to_string(),
            request_schema: plugin.request_schema(),
        }
    }

    /// Validate the descriptor for required fields.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.id.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("plugin id is required".into()));
        }
        if self.name.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(format!(
                "plugin '{}' is missing a name",
                self.id
            )));
        }
        if !self.request_schema.is_object() {
            return Err(GenerationError::InvalidRequest(format!(
                "plugin '{}' request schema must be a JSON object",
                self.id
            )));
        }
        Ok(())
    }
}

/// Deserialize a plugin request, mapping shape errors to `InvalidRequest`.
pub fn parse_request<T: DeserializeOwned>(
    plugin_id: &str,
    request: &serde_json::Value,
) -> Result<T, GenerationError> {
    serde_json::from_value(request.clone())
        .map_err(|e| GenerationError::InvalidRequest(format!("{plugin_id}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Req {
        prompt: String,
        #[serde(default)]
        duration_seconds: Option<u32>,
    }

    #[test]
    fn parse_request_reports_plugin_and_field() {
        let err = parse_request::<Req>("video-generation", &json!({"durationSeconds": 4}))
            .unwrap_err();
        match err {
            GenerationError::InvalidRequest(msg) => {
                assert!(msg.starts_with("video-generation: "));
                assert!(msg.contains("prompt"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let ok: Req = parse_request("p", &json!({"prompt": "cat"})).unwrap();
        assert_eq!(ok.prompt, "cat");
        assert_eq!(ok.duration_seconds, None);
    }

    #[test]
    fn descriptor_validation() {
        let mut d = PluginDescriptor {
            id: "image-generation".into(),
            name: "Image".into(),
            description: String::new(),
            request_schema: json!({"type": "object"}),
        };
        assert!(d.validate().is_ok());

        d.request_schema = json!("object");
        assert!(d.validate().is_err());

        d.request_schema = json!({});
        d.id = "  ".into();
        assert!(d.validate().is_err());
    }
}
