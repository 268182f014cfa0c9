pub mod policy;
pub mod poller;
pub mod sleeper;

pub use policy::{PollPolicy, PollState, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS};
pub use poller::JobPoller;
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
