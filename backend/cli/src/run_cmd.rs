//! CLI Run Command
//!
//! Runs one orchestration to completion and prints the final history entry.
//! Ctrl-C cancels the run instead of killing the process mid-poll.

use anyhow::{bail, Result};
use serde_json::Value;
use tracing::info;

use genforge_core::EntryStatus;
use genforge_orchestrator::Orchestrator;

use crate::terminal_output::{status_label, supports_color};

/// Parse the request argument; anything that is not JSON is sent as a bare string.
pub fn parse_request(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub async fn run(orchestrator: &Orchestrator, plugin_id: &str, raw_request: &str) -> Result<()> {
    let handle = orchestrator.run(plugin_id, parse_request(raw_request))?;
    let id = handle.id();
    eprintln!("Started {id} ({plugin_id})");

    let wait = handle.wait();
    tokio::pin!(wait);
    let entry = tokio::select! {
        entry = &mut wait => entry?,
        _ = tokio::signal::ctrl_c() => {
            info!(entry_id = %id, "Interrupted; cancelling run");
            orchestrator.cancel(id);
            wait.await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&entry)?);
    eprintln!("{id}: {}", status_label(entry.status, supports_color()));

    if entry.status != EntryStatus::Success {
        bail!(
            "run {id} ended {}: {}",
            entry.status,
            entry.error.as_deref().unwrap_or("no detail")
        );
    }
    Ok(())
}
