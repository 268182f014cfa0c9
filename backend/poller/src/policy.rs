//! Poll policy: fixed (or gently growing) delay between status checks, bounded attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub use genforge_core::defaults::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS};

/// Poll policy configuration. Fixed per orchestrator, not per plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollPolicy {
    /// Delay before each status check in milliseconds.
    pub poll_interval_ms: u64,
    /// Total number of status checks before giving up.
    pub max_attempts: u32,
    /// Multiplier applied to the delay after each attempt. 1.0 keeps it fixed.
    pub backoff_factor: f64,
    /// Cap on the computed delay in milliseconds.
    pub max_interval_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_factor: 1.0,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
        }
    }
}

impl PollPolicy {
    /// Fixed-interval policy.
    pub fn fixed(poll_interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            poll_interval_ms,
            max_attempts,
            backoff_factor: 1.0,
            max_interval_ms: poll_interval_ms.max(1),
        }
    }

    /// Compute the delay before attempt `attempt_number` (1-indexed).
    pub fn delay_for(&self, attempt_number: u32) -> Duration {
        if attempt_number == 0 {
            return Duration::ZERO;
        }
        let factor = if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            1.0
        };
        let delay_ms = self.poll_interval_ms as f64 * factor.powi((attempt_number - 1) as i32);
        let cap = self.max_interval_ms.max(self.poll_interval_ms);
        Duration::from_millis(delay_ms.min(cap as f64) as u64)
    }

    pub fn should_poll(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Worst-case wall-clock time a job may be polled for.
    pub fn budget(&self) -> Duration {
        (1..=self.max_attempts).map(|n| self.delay_for(n)).sum()
    }
}

/// Progress of one poll loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub attempts: u32,
    pub error_attempts: u32,
    pub last_error: Option<String>,
}

impl PollState {
    pub fn record_processing(&mut self) {
        self.attempts += 1;
        debug!(attempt = self.attempts, "Job still processing");
    }

    /// A failed status check consumes one attempt; it never aborts the job on its own.
    pub fn record_error(&mut self, policy: &PollPolicy, error: &str) {
        self.attempts += 1;
        self.error_attempts += 1;
        self.last_error = Some(error.to_string());
        warn!(
            attempt = self.attempts,
            max = policy.max_attempts,
            error = %error,
            "Status check failed, will retry"
        );
    }

    pub fn exhausted(&self, policy: &PollPolicy) -> bool {
        !policy.should_poll(self.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_fixed() {
        let policy = PollPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        assert_eq!(policy.delay_for(50), Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        assert_eq!(policy.budget(), Duration::from_secs(600));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = PollPolicy {
            poll_interval_ms: 1_000,
            max_attempts: 10,
            backoff_factor: 2.0,
            max_interval_ms: 5_000,
        };
        assert_eq!(policy.delay_for(1).as_millis(), 1_000);
        assert_eq!(policy.delay_for(2).as_millis(), 2_000);
        assert_eq!(policy.delay_for(3).as_millis(), 4_000);
        assert_eq!(policy.delay_for(4).as_millis(), 5_000);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn shrinking_or_invalid_factor_falls_back_to_fixed() {
        let policy = PollPolicy {
            backoff_factor: 0.5,
            ..PollPolicy::fixed(1_000, 3)
        };
        assert_eq!(policy.delay_for(3).as_millis(), 1_000);

        let policy = PollPolicy {
            backoff_factor: f64::NAN,
            ..PollPolicy::fixed(1_000, 3)
        };
        assert_eq!(policy.delay_for(2).as_millis(), 1_000);
    }

    #[test]
    fn state_tracks_errors_and_exhaustion() {
        let policy = PollPolicy::fixed(10, 2);
        let mut state = PollState::default();
        state.record_processing();
        assert!(!state.exhausted(&policy));
        state.record_error(&policy, "timeout");
        assert!(state.exhausted(&policy));
        assert_eq!(state.error_attempts, 1);
        assert_eq!(state.last_error.as_deref(), Some("timeout"));
    }
}
