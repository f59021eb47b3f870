use std::sync::Arc;

use tsunagi_api::ListPlugin;
use tsunagi_core::config::ServicesConfig;

use crate::SyncError;

/// Every list provider plugin known to the process, in registration order.
///
/// Built once at startup and shared behind an `Arc`. The enabled set is not
/// stored here; it is derived from the current [`ServicesConfig`] on each call.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn ListPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under its service identifier.
    pub fn register(&mut self, plugin: Arc<dyn ListPlugin>) -> Result<(), SyncError> {
        let service = plugin.service().to_string();
        if self.get(&service).is_some() {
            return Err(SyncError::DuplicateProvider { service });
        }
        tracing::info!(service = %service, "Registered list provider");
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn get(&self, service: &str) -> Option<Arc<dyn ListPlugin>> {
        self.plugins
            .iter()
            .find(|p| p.service() == service)
            .cloned()
    }

    /// Service identifiers in registration order.
    pub fn services(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.service()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugins the user has enabled, in registration order (not config order).
    pub fn enabled_plugins(&self, services: &ServicesConfig) -> Vec<Arc<dyn ListPlugin>> {
        self.plugins
            .iter()
            .filter(|p| services.is_enabled(p.service()))
            .cloned()
            .collect()
    }

    /// The plugin serving reads.
    pub fn main_plugin(&self, services: &ServicesConfig) -> Result<Arc<dyn ListPlugin>, SyncError> {
        self.get(&services.primary)
            .ok_or_else(|| SyncError::NoProviderConfigured {
                service: services.primary.clone(),
            })
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("services", &self.services())
            .finish()
    }
}
