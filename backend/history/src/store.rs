use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use genforge_core::{GenerationError, HistoryEntry, HistoryEvent, Transition};

/// Default capacity of the notification channel. Slow subscribers that fall
/// further behind than this observe `RecvError::Lagged` and should re-read `list()`.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// In-memory, append-only record of orchestration runs.
///
/// Entries keep creation order. Only `pending → terminal` updates are accepted;
/// each entry has a single writer, so the lock is held only for the copy in or out
/// and the matching notification.
pub struct HistoryStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<HistoryEvent>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<HistoryEntry>,
    index: HashMap<Uuid, usize>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    /// Subscribe to append/transition/clear notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    /// Append a new `pending` entry.
    pub fn append(&self, entry: HistoryEntry) -> Result<(), GenerationError> {
        if entry.status.is_terminal() {
            return Err(GenerationError::InvalidTransition {
                id: entry.id,
                status: entry.status.to_string(),
            });
        }
        {
            let mut inner = self.write();
            if inner.index.contains_key(&entry.id) {
                return Err(GenerationError::DuplicateId(entry.id.to_string()));
            }
            let position = inner.entries.len();
            inner.index.insert(entry.id, position);
            inner.entries.push(entry.clone());
            debug!(entry_id = %entry.id, plugin = %entry.plugin_id, "History entry appended");
            self.publish(HistoryEvent::Appended { entry });
        }
        Ok(())
    }

    /// Apply the single legal transition out of `pending`.
    pub fn update(&self, id: Uuid, transition: Transition) -> Result<HistoryEntry, GenerationError> {
        let updated = {
            let mut inner = self.write();
            let position = *inner
                .index
                .get(&id)
                .ok_or(GenerationError::EntryNotFound(id))?;
            let entry = &mut inner.entries[position];
            let Some(next) = entry.transitioned(transition) else {
                warn!(entry_id = %id, status = %entry.status, "Rejected update of terminal entry");
                return Err(GenerationError::InvalidTransition {
                    id,
                    status: entry.status.to_string(),
                });
            };
            *entry = next.clone();
            self.publish(HistoryEvent::Transitioned { entry: next.clone() });
            next
        };

        debug!(entry_id = %id, status = %updated.status, "History entry transitioned");
        Ok(updated)
    }

    pub fn get(&self, id: Uuid) -> Option<HistoryEntry> {
        let inner = self.read();
        inner.index.get(&id).map(|&i| inner.entries[i].clone())
    }

    /// Entries in creation order.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.read().entries.clone()
    }

    /// Entries newest first, the order presentation layers usually render.
    pub fn newest_first(&self) -> Vec<HistoryEntry> {
        let mut entries = self.list();
        entries.reverse();
        entries
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard every entry. Only ever called on explicit user request.
    pub fn clear(&self) {
        let removed = {
            let mut inner = self.write();
            let removed = inner.entries.len();
            *inner = Inner::default();
            self.publish(HistoryEvent::Cleared);
            removed
        };
        info!(removed, "History cleared");
    }

    /// Called with the write lock held so events go out in store order.
    fn publish(&self, event: HistoryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
