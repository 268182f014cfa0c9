//! `genforge-config` — GenForge runtime configuration.
//!
//! Provides:
//! - Typed config schema (poller, reasoning, providers, server, logging)
//! - YAML loading from `$GENFORGE_CONFIG_DIR/config.yaml`
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation report

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_raw_config};
pub use schema::GenForgeConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// Nothing is logged here: callers usually install their subscriber from the
/// returned config, then pass the report to [`ValidationReport::enforce`].
pub async fn load_with_report(path: &Path) -> Result<(GenForgeConfig, ValidationReport)> {
    let raw = load_raw_config(path).await?;
    prepare(raw, &std::env::vars().collect())
}

/// The load pipeline minus file IO: substitution, typing, defaults, validation.
pub fn prepare(raw: Value, env: &HashMap<String, String>) -> Result<(GenForgeConfig, ValidationReport)> {
    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;
    let config: GenForgeConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_all_defaults(config);
    let report = validate(&config);
    Ok((config, report))
}
