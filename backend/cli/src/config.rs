use std::path::PathBuf;

use genforge_config::defaults::{DEFAULT_BIND, DEFAULT_LOG_LEVEL, DEFAULT_PORT};
use genforge_config::GenForgeConfig;

/// Host settings for the `genforge` binary: the config file values with
/// environment overrides applied on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Rolling log directory; console only when `None`
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Resolve settings from a prepared config and the process environment.
    pub fn resolve(config: &GenForgeConfig) -> Self {
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    /// `GENFORGE_BIND` and `GENFORGE_PORT` win over the config file.
    pub fn resolve_with(config: &GenForgeConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let server = config.server.clone().unwrap_or_default();
        let logging = config.logging.clone().unwrap_or_default();

        Self {
            bind_address: env("GENFORGE_BIND")
                .or(server.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: env("GENFORGE_PORT")
                .and_then(|p| p.parse().ok())
                .or(server.port)
                .unwrap_or(DEFAULT_PORT),
            log_level: logging.level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_dir: logging.dir.map(PathBuf::from),
        }
    }
}
