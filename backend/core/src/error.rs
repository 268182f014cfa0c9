use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for the generation runtime.
///
/// Once an orchestration run owns a history entry these errors are data: they
/// are rendered into the entry's `error` field rather than returned to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("plugin not found: {0}")]
    NotFound(String),

    #[error("plugin id already registered: {0}")]
    DuplicateId(String),

    #[error("input is required")]
    InputRequired,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("history entry {id} is already {status}")]
    InvalidTransition { id: Uuid, status: String },

    #[error("history entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("job {job_id} still processing after {attempts} poll attempts{}", last_error_suffix(.last_error))]
    Timeout {
        job_id: String,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("cancelled")]
    Cancelled,
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {e})"),
        None => String::new(),
    }
}

impl GenerationError {
    /// Normalize any provider-side failure into a single detail string.
    pub fn provider(err: impl std::fmt::Display) -> Self {
        Self::Provider(err.to_string())
    }

    /// Short machine-readable classification, used in logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateId(_) => "duplicate_id",
            Self::InputRequired => "input_required",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::EntryNotFound(_) => "entry_not_found",
            Self::Timeout { .. } => "timeout",
            Self::Provider(_) => "provider",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<anyhow::Error> for GenerationError {
    fn from(err: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line.
        Self::Provider(format!("{err:#}"))
    }
}
