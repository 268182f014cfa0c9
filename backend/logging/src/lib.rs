//! Structured logging for GenForge.
//!
//! Handles subscriber setup (console + rolling NDJSON), redaction of provider
//! secrets, and the per-run generation event log.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{GenerationEvent, GenerationEventLogger, GenerationLogEntry};
pub use logger::{LoggerGuard, init_logger};
pub use redact::redact_sensitive_data;
