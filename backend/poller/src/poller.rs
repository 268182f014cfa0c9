//! Job poller: drives a `JobHandle` through `poll_status` until a terminal state.
//!
//! ```text
//! loop attempts < max_attempts:
//!   sleep(delay)            -- raced against cancellation
//!   poll_status(job)
//!     processing  -> continue
//!     succeeded   -> Ok(result)
//!     failed      -> Err(Provider)
//!     error       -> consume attempt, continue
//! exhausted       -> Err(Timeout)
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use genforge_core::{GenerationError, GenerationPlugin, JobHandle, JobStatus};

use crate::policy::{PollPolicy, PollState};
use crate::sleeper::{Sleeper, TokioSleeper};

pub struct JobPoller {
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl JobPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: PollPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll `job` until it succeeds, fails, times out, or `cancel` fires.
    pub async fn poll(
        &self,
        plugin: &dyn GenerationPlugin,
        job: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GenerationError> {
        let mut state = PollState::default();

        info!(
            job = %job,
            max_attempts = self.policy.max_attempts,
            interval_ms = self.policy.poll_interval_ms,
            "Polling job"
        );

        while !state.exhausted(&self.policy) {
            let delay = self.policy.delay_for(state.attempts + 1);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job = %job, attempts = state.attempts, "Polling cancelled");
                    return Err(GenerationError::Cancelled);
                }
                _ = self.sleeper.sleep(delay) => {}
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job = %job, attempts = state.attempts, "Polling cancelled mid-request");
                    return Err(GenerationError::Cancelled);
                }
                status = plugin.poll_status(job) => status,
            };

            match status {
                Ok(JobStatus::Processing) => state.record_processing(),
                Ok(JobStatus::Succeeded { result }) => {
                    info!(job = %job, attempts = state.attempts + 1, "Job succeeded");
                    return Ok(result);
                }
                Ok(JobStatus::Failed { error_detail }) => {
                    warn!(job = %job, attempts = state.attempts + 1, error = %error_detail, "Job failed");
                    return Err(GenerationError::Provider(error_detail));
                }
                Err(e) => state.record_error(&self.policy, &e.to_string()),
            }
        }

        debug!(job = %job, ?state, "Poll budget exhausted");
        warn!(
            job = %job,
            attempts = state.attempts,
            error_attempts = state.error_attempts,
            "Job timed out"
        );
        Err(GenerationError::Timeout {
            job_id: job.external_id.clone(),
            attempts: state.attempts,
            last_error: state.last_error,
        })
    }
}
