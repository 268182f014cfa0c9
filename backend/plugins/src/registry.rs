/// Plugin registry — holds every generation capability, keyed by id.
///
/// Plugins are wired once at startup; afterwards the registry is shared behind
/// an `Arc` and only read, so lookups take no locks.
use std::collections::HashMap;
use std::sync::Arc;

use genforge_core::{GenerationError, GenerationPlugin};
use tracing::{info, warn};

use crate::manifest::PluginDescriptor;

#[derive(Default)]
pub struct PluginRegistry {
    /// Registration order, for deterministic enumeration.
    plugins: Vec<Arc<dyn GenerationPlugin>>,
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Fails without touching the existing entry if the id is taken.
    pub fn register(&mut self, plugin: Arc<dyn GenerationPlugin>) -> Result<(), GenerationError> {
        let descriptor = PluginDescriptor::of(plugin.as_ref());
        descriptor.validate()?;

        if self.index.contains_key(&descriptor.id) {
            warn!(plugin = %descriptor.id, "Duplicate plugin registration rejected");
            return Err(GenerationError::DuplicateId(descriptor.id));
        }

        info!(plugin = %descriptor.id, name = %descriptor.name, "Registered plugin");
        self.index.insert(descriptor.id, self.plugins.len());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Builder-style registration for startup wiring.
    pub fn with(mut self, plugin: Arc<dyn GenerationPlugin>) -> Result<Self, GenerationError> {
        self.register(plugin)?;
        Ok(self)
    }

    /// Look up a plugin by id.
    pub fn get(&self, id: &str) -> Result<Arc<dyn GenerationPlugin>, GenerationError> {
        self.index
            .get(id)
            .map(|&i| Arc::clone(&self.plugins[i]))
            .ok_or_else(|| GenerationError::NotFound(id.to_string()))
    }

    /// All plugins in registration order.
    pub fn list(&self) -> &[Arc<dyn GenerationPlugin>] {
        &self.plugins
    }

    /// Descriptors for every plugin, in registration order.
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins
            .iter()
            .map(|p| PluginDescriptor::of(p.as_ref()))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
