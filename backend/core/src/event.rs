use serde::{Deserialize, Serialize};

use crate::types::HistoryEntry;

/// Notification published by the history store on every mutation.
///
/// Each variant carries a full snapshot so observers can render live status
/// without reading the store back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    /// A new `pending` entry was appended.
    Appended { entry: HistoryEntry },
    /// An entry moved out of `pending`.
    Transitioned { entry: HistoryEntry },
    /// All entries were discarded by an explicit user action.
    Cleared,
}

impl HistoryEvent {
    /// The entry carried by this event, if any.
    pub fn entry(&self) -> Option<&HistoryEntry> {
        match self {
            Self::Appended { entry } | Self::Transitioned { entry } => Some(entry),
            Self::Cleared => None,
        }
    }
}

impl std::fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Appended { entry } => write!(f, "appended {} ({})", entry.id, entry.plugin_id),
            Self::Transitioned { entry } => {
                write!(f, "{} -> {}", entry.id, entry.status)
            }
            Self::Cleared => f.write_str("cleared"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transition;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let entry = HistoryEntry::pending("image-generation", json!({"prompt": "cat"}));
        let event = HistoryEvent::Appended { entry: entry.clone() };
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: HistoryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
        assert_eq!(deserialized.entry().map(|e| e.id), Some(entry.id));
    }

    #[test]
    fn test_event_display() {
        let entry = HistoryEntry::pending("p", json!({}))
            .transitioned(Transition::Succeed(json!(1)))
            .unwrap();
        let event = HistoryEvent::Transitioned { entry: entry.clone() };
        assert_eq!(event.to_string(), format!("{} -> success", entry.id));
        assert_eq!(HistoryEvent::Cleared.to_string(), "cleared");
    }
}
