//! Config defaults: fills every unset runtime knob after load.

use crate::schema::{GenForgeConfig, LoggingConfig, PollerConfig, ReasoningConfig, ServerConfig};

pub use genforge_core::defaults::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_INTERVAL_MS, DEFAULT_MAX_STEPS, DEFAULT_MAX_TOKENS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REASONING_MODEL, DEFAULT_TEMPERATURE, MAX_STEPS_LIMIT,
};

pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;

pub const DEFAULT_REASONING_PROVIDER: &str = "openrouter";

pub const DEFAULT_BIND: &str = "127.0.0.1";

pub const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: GenForgeConfig) -> GenForgeConfig {
    let config = apply_poller_defaults(config);
    let config = apply_reasoning_defaults(config);
    let config = apply_server_defaults(config);
    apply_logging_defaults(config)
}

fn apply_poller_defaults(mut config: GenForgeConfig) -> GenForgeConfig {
    let poller = config.poller.get_or_insert_with(PollerConfig::default);
    poller.poll_interval_ms.get_or_insert(DEFAULT_POLL_INTERVAL_MS);
    poller.max_attempts.get_or_insert(DEFAULT_MAX_ATTEMPTS);
    poller.backoff_factor.get_or_insert(DEFAULT_BACKOFF_FACTOR);
    poller.max_interval_ms.get_or_insert(DEFAULT_MAX_INTERVAL_MS);
    config
}

fn apply_reasoning_defaults(mut config: GenForgeConfig) -> GenForgeConfig {
    let reasoning = config.reasoning.get_or_insert_with(ReasoningConfig::default);
    if reasoning.provider.is_none() {
        reasoning.provider = Some(DEFAULT_REASONING_PROVIDER.to_string());
    }
    if reasoning.model.is_none() {
        reasoning.model = Some(DEFAULT_REASONING_MODEL.to_string());
    }
    reasoning.default_max_steps.get_or_insert(DEFAULT_MAX_STEPS);
    reasoning.max_tokens.get_or_insert(DEFAULT_MAX_TOKENS);
    reasoning.temperature.get_or_insert(DEFAULT_TEMPERATURE);
    config
}

fn apply_server_defaults(mut config: GenForgeConfig) -> GenForgeConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    if server.bind.is_none() {
        server.bind = Some(DEFAULT_BIND.to_string());
    }
    server.port.get_or_insert(DEFAULT_PORT);
    config
}

fn apply_logging_defaults(mut config: GenForgeConfig) -> GenForgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}
