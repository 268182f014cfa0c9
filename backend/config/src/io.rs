//! Config file location and loading.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the GenForge config directory.
/// Priority: `GENFORGE_CONFIG_DIR` env > `~/.genforge/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GENFORGE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".genforge"),
        None => PathBuf::from(".genforge"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the config file as an untyped tree, before env substitution.
///
/// A missing file (first run) or an empty one yields an empty object.
pub async fn load_raw_config(path: &Path) -> Result<Value> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let value = parse_yaml(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(value)
}

pub(crate) fn parse_yaml(raw: &str) -> Result<Value> {
    let value: Value = serde_yaml::from_str(raw)?;
    Ok(match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    })
}
