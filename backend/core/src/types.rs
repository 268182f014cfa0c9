use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of a plugin's `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The provider answered synchronously.
    Immediate(serde_json::Value),
    /// The provider accepted the request and returned a job to poll.
    Pending(JobHandle),
}

/// Opaque handle for an external asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub plugin_id: String,
    pub external_id: String,
}

impl JobHandle {
    pub fn new(plugin_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin_id, self.external_id)
    }
}

/// Status of an external job as reported by `poll_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Succeeded { result: serde_json::Value },
    Failed { error_detail: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// Lifecycle status of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Success,
    Error,
    Cancelled,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One orchestration attempt, as recorded in the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub plugin_id: String,
    /// Stored verbatim.
    pub request: serde_json::Value,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// A fresh `pending` entry stamped with the current time.
    pub fn pending(plugin_id: impl Into<String>, request: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            plugin_id: plugin_id.into(),
            request,
            status: EntryStatus::Pending,
            result: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Apply a terminal transition. Callers check legality first.
    pub(crate) fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Succeed(result) => {
                self.status = EntryStatus::Success;
                self.result = Some(result);
            }
            Transition::Fail(detail) => {
                self.status = EntryStatus::Error;
                self.error = Some(detail);
            }
            Transition::Cancel => {
                self.status = EntryStatus::Cancelled;
                self.error = Some("cancelled".to_string());
            }
        }
    }

    /// Returns a copy with `transition` applied, or `None` if the entry is terminal.
    pub fn transitioned(&self, transition: Transition) -> Option<Self> {
        if self.status.is_terminal() {
            return None;
        }
        let mut next = self.clone();
        next.apply(transition);
        Some(next)
    }
}

/// The only legal mutations of a history entry, all out of `pending`.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Succeed(serde_json::Value),
    Fail(String),
    Cancel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_entry_has_no_result_or_error() {
        let entry = HistoryEntry::pending("image-generation", json!({"prompt": "cat"}));
        assert_eq!(entry.status, EntryStatus::Pending);
        assert!(entry.result.is_none());
        assert!(entry.error.is_none());
        assert_eq!(entry.request, json!({"prompt": "cat"}));
    }

    #[test]
    fn transition_sets_exactly_one_of_result_or_error() {
        let entry = HistoryEntry::pending("p", json!({}));

        let ok = entry.transitioned(Transition::Succeed(json!("done"))).unwrap();
        assert_eq!(ok.status, EntryStatus::Success);
        assert_eq!(ok.result, Some(json!("done")));
        assert!(ok.error.is_none());
        assert_eq!(ok.timestamp, entry.timestamp);

        let failed = entry.transitioned(Transition::Fail("boom".into())).unwrap();
        assert_eq!(failed.status, EntryStatus::Error);
        assert!(failed.result.is_none());
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let cancelled = entry.transitioned(Transition::Cancel).unwrap();
        assert_eq!(cancelled.status, EntryStatus::Cancelled);
        assert_eq!(cancelled.error.as_deref(), Some("cancelled"));
    }

    #[test]
    fn terminal_entries_do_not_transition() {
        let entry = HistoryEntry::pending("p", json!({}))
            .transitioned(Transition::Fail("boom".into()))
            .unwrap();
        assert!(entry.transitioned(Transition::Succeed(json!(1))).is_none());
        assert!(entry.transitioned(Transition::Cancel).is_none());
    }

    #[test]
    fn entry_serializes_camel_case() {
        let entry = HistoryEntry::pending("video-generation", json!({}));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["pluginId"], "video-generation");
        assert_eq!(value["status"], "pending");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn job_status_wire_shape() {
        let status = JobStatus::Succeeded {
            result: json!({"resultUrl": "https://x/y.mp4"}),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "succeeded");
        assert!(status.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
