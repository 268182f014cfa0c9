pub mod engine;
pub mod plugin;
pub mod providers;
pub mod request;
pub mod step;

pub use engine::{EngineConfig, RunMetadata, SequentialEngine, SequentialRunResult, SequentialStepResult};
pub use plugin::{SequentialThinkingPlugin, REASONING_PLUGIN_ID};
pub use providers::ProviderRegistry;
pub use request::{ReasoningRequest, DEFAULT_MAX_STEPS, MAX_STEPS_LIMIT};
