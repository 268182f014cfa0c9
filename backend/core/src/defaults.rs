//! Runtime defaults shared by the poller, the reasoning engine and config loading.

/// Delay between status checks of an external job.
///
/// Video providers typically need 30s to 3min per clip; 5s keeps the UI
/// responsive without hammering the provider's status endpoint.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Status checks before a job is reported as timed out: 120 × 5s = 10 minutes.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Cap on a backed-off poll delay.
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 60_000;

pub const DEFAULT_REASONING_MODEL: &str = "openai/gpt-4o-mini";

pub const DEFAULT_MAX_TOKENS: u32 = 1024;

pub const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Reasoning steps when a request does not ask for a count.
pub const DEFAULT_MAX_STEPS: u32 = 5;

/// Upper bound on reasoning steps; requests asking for more are clamped.
pub const MAX_STEPS_LIMIT: u32 = 10;
