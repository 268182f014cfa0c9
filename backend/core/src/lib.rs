pub mod defaults;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use error::GenerationError;
pub use event::HistoryEvent;
pub use traits::{GenerationPlugin, LlmProvider, LlmRequest, LlmResponse};
pub use types::{EntryStatus, HistoryEntry, JobHandle, JobStatus, Outcome, Transition};
