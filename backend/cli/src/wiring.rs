//! Builds the runtime graph (providers, plugins, poller, history) from config.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use genforge_config::defaults as cfg_defaults;
use genforge_config::GenForgeConfig;
use genforge_core::LlmProvider;
use genforge_history::HistoryStore;
use genforge_orchestrator::Orchestrator;
use genforge_plugins::{
    ImageGenerationConfig, ImageGenerationPlugin, PluginRegistry, VideoGenerationConfig,
    VideoGenerationPlugin,
};
use genforge_poller::{JobPoller, PollPolicy};
use genforge_reasoning::providers::mock::MockProvider;
use genforge_reasoning::providers::ollama::OllamaProvider;
use genforge_reasoning::providers::openrouter::OpenRouterProvider;
use genforge_reasoning::{EngineConfig, ProviderRegistry, SequentialEngine, SequentialThinkingPlugin};

pub fn build_orchestrator(config: &GenForgeConfig) -> Result<Orchestrator> {
    let registry = build_registry(config)?;
    let poller = JobPoller::new(poll_policy(config));
    Ok(Orchestrator::new(
        Arc::new(registry),
        Arc::new(HistoryStore::new()),
        poller,
    ))
}

pub fn poll_policy(config: &GenForgeConfig) -> PollPolicy {
    let poller = config.poller.clone().unwrap_or_default();
    PollPolicy {
        poll_interval_ms: poller.poll_interval_ms.unwrap_or(cfg_defaults::DEFAULT_POLL_INTERVAL_MS),
        max_attempts: poller.max_attempts.unwrap_or(cfg_defaults::DEFAULT_MAX_ATTEMPTS),
        backoff_factor: poller.backoff_factor.unwrap_or(cfg_defaults::DEFAULT_BACKOFF_FACTOR),
        max_interval_ms: poller.max_interval_ms.unwrap_or(cfg_defaults::DEFAULT_MAX_INTERVAL_MS),
    }
}

/// Register every plugin whose backend is configured, in a fixed order.
pub fn build_registry(config: &GenForgeConfig) -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    let providers = config.providers.clone().unwrap_or_default();

    if let Some(images) = providers.images.as_ref() {
        if let Some(api_key) = images.api_key() {
            let mut plugin_config = ImageGenerationConfig {
                api_key: api_key.to_string(),
                ..Default::default()
            };
            if let Some(url) = &images.base_url {
                plugin_config.base_url = url.clone();
            }
            if let Some(model) = &images.model {
                plugin_config.default_model = model.clone();
            }
            registry.register(Arc::new(ImageGenerationPlugin::new(plugin_config)))?;
        }
    }

    if let Some(video) = providers.video.as_ref() {
        if let Some(api_key) = video.api_key() {
            let mut plugin_config = VideoGenerationConfig {
                api_key: api_key.to_string(),
                ..Default::default()
            };
            if let Some(url) = &video.base_url {
                plugin_config.base_url = url.clone();
            }
            if let Some(model) = &video.model {
                plugin_config.default_model = model.clone();
            }
            registry.register(Arc::new(VideoGenerationPlugin::new(plugin_config)))?;
        }
    }

    match reasoning_provider(config) {
        Some(provider) => {
            let engine = SequentialEngine::new(provider, engine_config(config));
            registry.register(Arc::new(SequentialThinkingPlugin::new(engine)))?;
        }
        None => warn!("No reasoning provider available; sequential-thinking disabled"),
    }

    let ids: Vec<&str> = registry.list().iter().map(|p| p.id()).collect();
    info!(plugins = ?ids, "Plugin registry ready");
    Ok(registry)
}

fn engine_config(config: &GenForgeConfig) -> EngineConfig {
    let reasoning = config.reasoning.clone().unwrap_or_default();
    let defaults = EngineConfig::default();
    EngineConfig {
        model: reasoning.model.unwrap_or(defaults.model),
        max_tokens: reasoning.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: reasoning.temperature.unwrap_or(defaults.temperature),
        default_max_steps: reasoning.default_max_steps.unwrap_or(defaults.default_max_steps),
    }
}

fn reasoning_provider(config: &GenForgeConfig) -> Option<Arc<dyn LlmProvider>> {
    let providers = config.providers.clone().unwrap_or_default();
    let mut registry = ProviderRegistry::new();

    if let Some(openrouter) = &providers.openrouter {
        if let Some(api_key) = openrouter.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let mut provider = OpenRouterProvider::new(api_key);
            if let Some(url) = &openrouter.base_url {
                provider = provider.with_base_url(url.clone());
            }
            registry.register("openrouter", Arc::new(provider));
        }
    }

    let mut ollama = OllamaProvider::new();
    if let Some(url) = providers.ollama.as_ref().and_then(|o| o.base_url.clone()) {
        ollama = ollama.with_base_url(url);
    }
    registry.register("ollama", Arc::new(ollama));
    registry.register("mock", Arc::new(MockProvider::new("mock")));

    let wanted = config
        .reasoning
        .as_ref()
        .and_then(|r| r.provider.clone())
        .unwrap_or_else(|| cfg_defaults::DEFAULT_REASONING_PROVIDER.to_string());
    let provider = registry.get(&wanted);
    if provider.is_some() {
        info!(provider = %wanted, available = ?registry.list(), "Reasoning provider selected");
    }
    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use genforge_config::schema::{MediaProviderConfig, PollerConfig, ProvidersConfig, ReasoningConfig};

    #[test]
    fn unconfigured_media_plugins_are_skipped() {
        let mut cfg = GenForgeConfig::default();
        cfg.reasoning = Some(ReasoningConfig {
            provider: Some("mock".into()),
            ..Default::default()
        });
        let registry = build_registry(&cfg).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("sequential-thinking"));
    }

    #[test]
    fn registers_in_fixed_order() {
        let key = |k: &str| MediaProviderConfig {
            api_key: Some(k.into()),
            ..Default::default()
        };
        let mut cfg = GenForgeConfig::default();
        cfg.providers = Some(ProvidersConfig {
            images: Some(key("img")),
            video: Some(key("vid")),
            ..Default::default()
        });
        cfg.reasoning = Some(ReasoningConfig {
            provider: Some("ollama".into()),
            ..Default::default()
        });

        let registry = build_registry(&cfg).unwrap();
        let ids: Vec<&str> = registry.list().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["image-generation", "video-generation", "sequential-thinking"]);
    }

    #[test]
    fn openrouter_without_key_disables_reasoning() {
        let registry = build_registry(&GenForgeConfig::default()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn poll_policy_follows_config() {
        let mut cfg = GenForgeConfig::default();
        cfg.poller = Some(PollerConfig {
            poll_interval_ms: Some(2_000),
            max_attempts: Some(30),
            ..Default::default()
        });
        let policy = poll_policy(&cfg);
        assert_eq!(policy.poll_interval_ms, 2_000);
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.backoff_factor, 1.0);
    }
}
