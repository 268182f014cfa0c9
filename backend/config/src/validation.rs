//! Config validation with path-qualified, user-facing messages.

use crate::defaults::MAX_STEPS_LIMIT;
use crate::schema::GenForgeConfig;
use std::path::Path;
use thiserror::Error;

const KNOWN_PROVIDERS: &[&str] = &["openrouter", "ollama", "mock"];
const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A config validation finding with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Log every finding, then fail on the first error.
    pub fn enforce(&self, source: &Path) -> anyhow::Result<()> {
        for warning in &self.warnings {
            tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
        }
        for error in &self.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        if let Some(first) = self.errors.first() {
            anyhow::bail!("{first} ({} error(s) in {})", self.errors.len(), source.display());
        }
        Ok(())
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &GenForgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_poller(config, &mut report);
    validate_reasoning(config, &mut report);
    validate_providers(config, &mut report);
    validate_server(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_poller(config: &GenForgeConfig, report: &mut ValidationReport) {
    let Some(poller) = &config.poller else { return };
    if poller.max_attempts == Some(0) {
        report.error("poller.maxAttempts", "maxAttempts must be >= 1");
    }
    if poller.poll_interval_ms == Some(0) {
        report.error("poller.pollIntervalMs", "pollIntervalMs must be > 0");
    }
    if let Some(factor) = poller.backoff_factor {
        if !factor.is_finite() || factor < 1.0 {
            report.warn(
                "poller.backoffFactor",
                format!("backoffFactor {factor} is below 1.0; the interval will stay fixed"),
            );
        }
    }
    if let (Some(interval), Some(cap)) = (poller.poll_interval_ms, poller.max_interval_ms) {
        if cap < interval {
            report.warn(
                "poller.maxIntervalMs",
                "maxIntervalMs is smaller than pollIntervalMs and will cap every delay",
            );
        }
    }
}

fn validate_reasoning(config: &GenForgeConfig, report: &mut ValidationReport) {
    let Some(reasoning) = &config.reasoning else { return };
    if let Some(provider) = &reasoning.provider {
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            report.error(
                "reasoning.provider",
                format!("Unknown provider '{provider}'. Use 'openrouter', 'ollama', or 'mock'"),
            );
        }
        let openrouter_key = config
            .providers
            .as_ref()
            .and_then(|p| p.openrouter.as_ref())
            .and_then(|o| o.api_key.as_deref())
            .map(str::trim)
            .filter(|k| !k.is_empty());
        if provider == "openrouter" && openrouter_key.is_none() {
            report.warn(
                "providers.openrouter.apiKey",
                "No OpenRouter API key; sequential-thinking will not be available",
            );
        }
    }
    if let Some(steps) = reasoning.default_max_steps {
        if !(1..=MAX_STEPS_LIMIT).contains(&steps) {
            report.warn(
                "reasoning.defaultMaxSteps",
                format!("defaultMaxSteps {steps} is outside 1..={MAX_STEPS_LIMIT} and will be clamped"),
            );
        }
    }
    if let Some(t) = reasoning.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("reasoning.temperature", "temperature must be within 0.0..=2.0");
        }
    }
    if reasoning.max_tokens == Some(0) {
        report.error("reasoning.maxTokens", "maxTokens must be > 0");
    }
}

fn validate_providers(config: &GenForgeConfig, report: &mut ValidationReport) {
    let providers = config.providers.as_ref();
    let images = providers.and_then(|p| p.images.as_ref());
    if images.and_then(|m| m.api_key()).is_none() {
        report.warn(
            "providers.images.apiKey",
            "No image provider API key; image-generation will not be registered",
        );
    }
    let video = providers.and_then(|p| p.video.as_ref());
    if video.and_then(|m| m.api_key()).is_none() {
        report.warn(
            "providers.video.apiKey",
            "No video provider API key; video-generation will not be registered",
        );
    }
}

fn validate_server(config: &GenForgeConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    if let Some(port) = server.port {
        if port == 0 {
            report.error("server.port", "port must be > 0");
        } else if port < 1024 && port != 80 && port != 443 {
            report.warn(
                "server.port",
                format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
            );
        }
    }
}

fn validate_logging(config: &GenForgeConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else {
        return;
    };
    if !KNOWN_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.warn("logging.level", format!("Unknown log level '{level}'; RUST_LOG syntax is passed through"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{MediaProviderConfig, PollerConfig, ProvidersConfig, ReasoningConfig};

    fn paths(findings: &[ConfigValidationError]) -> Vec<&str> {
        findings.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn defaults_are_valid_with_missing_key_warnings() {
        let report = validate(&apply_all_defaults(GenForgeConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        let warned = paths(&report.warnings);
        assert!(warned.contains(&"providers.images.apiKey"));
        assert!(warned.contains(&"providers.video.apiKey"));
        assert!(warned.contains(&"providers.openrouter.apiKey"));
    }

    #[test]
    fn zero_max_attempts_is_error() {
        let mut cfg = GenForgeConfig::default();
        cfg.poller = Some(PollerConfig {
            max_attempts: Some(0),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(paths(&report.errors), vec!["poller.maxAttempts"]);
    }

    #[test]
    fn unknown_reasoning_provider_is_error() {
        let mut cfg = GenForgeConfig::default();
        cfg.reasoning = Some(ReasoningConfig {
            provider: Some("claude-desktop".into()),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(report.errors[0].message.contains("claude-desktop"));
    }

    #[test]
    fn configured_video_key_clears_its_warning() {
        let mut cfg = GenForgeConfig::default();
        cfg.providers = Some(ProvidersConfig {
            video: Some(MediaProviderConfig {
                api_key: Some("rw-key".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(!paths(&report.warnings).contains(&"providers.video.apiKey"));
    }

    #[test]
    fn max_steps_outside_engine_limit_warns() {
        let mut cfg = GenForgeConfig::default();
        cfg.reasoning = Some(ReasoningConfig {
            default_max_steps: Some(MAX_STEPS_LIMIT),
            ..Default::default()
        });
        assert!(!paths(&validate(&cfg).warnings).contains(&"reasoning.defaultMaxSteps"));

        cfg.reasoning = Some(ReasoningConfig {
            default_max_steps: Some(MAX_STEPS_LIMIT + 1),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(paths(&report.warnings).contains(&"reasoning.defaultMaxSteps"));
        assert!(report.is_valid());
    }
}
