//! Generation Event Logger
//!
//! One structured record per run lifecycle step, emitted on the
//! `generation_events` target so it can be routed to its own sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    Submitted,
    JobStarted { job_id: String },
    Completed { duration_ms: u64 },
    Failed { error_kind: String, error_msg: String },
    Cancelled,
}

#[derive(Debug, Serialize)]
pub struct GenerationLogEntry {
    pub entry_id: Uuid,
    pub plugin_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: GenerationEvent,
}

pub struct GenerationEventLogger;

impl GenerationEventLogger {
    /// Build the redacted log record for a run event.
    pub fn entry(entry_id: Uuid, plugin_id: &str, mut event: GenerationEvent) -> GenerationLogEntry {
        if let GenerationEvent::Failed { error_msg, .. } = &mut event {
            *error_msg = redact_sensitive_data(error_msg);
        }
        GenerationLogEntry {
            entry_id,
            plugin_id: plugin_id.to_string(),
            timestamp: Utc::now(),
            event,
        }
    }

    /// Log a run event through the tracing pipeline.
    pub fn log_event(entry_id: Uuid, plugin_id: &str, event: GenerationEvent) {
        let record = Self::entry(entry_id, plugin_id, event);
        let payload = serde_json::to_string(&record).unwrap_or_else(|_| format!("{record:?}"));
        match record.event {
            GenerationEvent::Failed { .. } => {
                warn!(target: "generation_events", entry_id = %entry_id, event = %payload, "Generation event");
            }
            _ => {
                info!(target: "generation_events", entry_id = %entry_id, event = %payload, "Generation event");
            }
        }
    }
}
