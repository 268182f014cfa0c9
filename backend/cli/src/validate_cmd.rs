//! CLI Validate-Config Command
//!
//! Checks env var references, then runs the full load pipeline and prints
//! every finding.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Result};

use genforge_config::{collect_referenced_vars, load_raw_config, prepare};

use crate::terminal_output::{note_error, note_info, note_success, note_warn};

pub async fn run(path: &Path) -> Result<()> {
    note_info(&format!("Validating {}", path.display()));
    if !path.exists() {
        note_warn("Config file not found; built-in defaults apply");
    }

    let raw = load_raw_config(path).await?;
    let env: HashMap<String, String> = std::env::vars().collect();

    let mut missing = 0;
    for var in collect_referenced_vars(&raw) {
        match env.get(&var) {
            Some(value) if !value.is_empty() => note_success(&format!("{var} is set")),
            _ => {
                note_error(&format!("{var} is referenced but not set"));
                missing += 1;
            }
        }
    }
    if missing > 0 {
        bail!("{missing} referenced env var(s) missing");
    }

    let (_, report) = prepare(raw, &env)?;
    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for error in &report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }

    if !report.is_valid() {
        bail!("config has {} error(s)", report.errors.len());
    }
    note_success(&format!("Config is valid ({} warning(s))", report.warnings.len()));
    Ok(())
}
