//! Multi-provider fan-out.
//!
//! A [`ListOperation`] is sent to every enabled plugin at once; the
//! dispatcher waits for all of them to settle before reducing the results.
//! The first-registered plugin's entry is canonical. A failure on any
//! plugin fails the whole dispatch, but what the other plugins applied
//! stays applied.

use std::sync::Arc;

use futures::future::join_all;
use tsunagi_api::{EditOptions, ListEntry, ListFilter, ListPlugin, ListStatus, ProviderError};
use tsunagi_core::config::ServicesConfig;

use crate::registry::PluginRegistry;
use crate::SyncError;

/// A logical list mutation and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ListOperation {
    AddToList { media_id: u64 },
    DeleteFromList { media_id: u64 },
    UpdateStatus { media_id: u64, status: ListStatus },
    UpdateScore { media_id: u64, score: f32 },
    UpdateProgress { media_id: u64, progress: u32 },
    StartRewatching { media_id: u64 },
    EditListEntry { media_id: u64, options: EditOptions },
}

impl ListOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddToList { .. } => "AddToList",
            Self::DeleteFromList { .. } => "DeleteFromList",
            Self::UpdateStatus { .. } => "UpdateStatus",
            Self::UpdateScore { .. } => "UpdateScore",
            Self::UpdateProgress { .. } => "UpdateProgress",
            Self::StartRewatching { .. } => "StartRewatching",
            Self::EditListEntry { .. } => "EditListEntry",
        }
    }

    pub fn media_id(&self) -> u64 {
        match self {
            Self::AddToList { media_id }
            | Self::DeleteFromList { media_id }
            | Self::UpdateStatus { media_id, .. }
            | Self::UpdateScore { media_id, .. }
            | Self::UpdateProgress { media_id, .. }
            | Self::StartRewatching { media_id }
            | Self::EditListEntry { media_id, .. } => *media_id,
        }
    }

    async fn invoke(&self, plugin: &dyn ListPlugin) -> Result<ListEntry, ProviderError> {
        match self {
            Self::AddToList { media_id } => plugin.add_to_list(*media_id).await,
            Self::DeleteFromList { media_id } => plugin.delete_from_list(*media_id).await,
            Self::UpdateStatus { media_id, status } => {
                plugin.update_status(*media_id, *status).await
            }
            Self::UpdateScore { media_id, score } => plugin.update_score(*media_id, *score).await,
            Self::UpdateProgress { media_id, progress } => {
                plugin.update_progress(*media_id, *progress).await
            }
            Self::StartRewatching { media_id } => plugin.start_rewatching(*media_id).await,
            Self::EditListEntry { media_id, options } => {
                plugin.edit_list_entry(*media_id, options.clone()).await
            }
        }
    }
}

/// The enabled plugin set, resolved once for a single dispatch.
pub(crate) struct Fanout {
    plugins: Vec<Arc<dyn ListPlugin>>,
}

impl Fanout {
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Invoke `operation` on every plugin concurrently and wait for all of them.
    ///
    /// Returns `Ok(None)` without calling anything when the set is empty.
    pub async fn run(self, operation: ListOperation) -> Result<Option<ListEntry>, SyncError> {
        if self.plugins.is_empty() {
            tracing::debug!(
                operation = operation.name(),
                "No list providers enabled, skipping"
            );
            return Ok(None);
        }

        tracing::debug!(
            operation = operation.name(),
            media_id = operation.media_id(),
            providers = self.plugins.len(),
            "Dispatching list mutation"
        );

        let operation = &operation;
        let calls = self.plugins.iter().map(|plugin| async move {
            let result = operation.invoke(plugin.as_ref()).await;
            (plugin.service(), result)
        });
        let settled = join_all(calls).await;

        let mut canonical = None;
        let mut failure = None;
        for (service, result) in settled {
            match result {
                Ok(entry) => {
                    if canonical.is_none() {
                        canonical = Some(entry);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        service = %service,
                        operation = operation.name(),
                        error = %e,
                        "List provider mutation failed"
                    );
                    if failure.is_none() {
                        failure = Some((service.to_string(), e));
                    }
                }
            }
        }

        if let Some((service, source)) = failure {
            return Err(SyncError::ProviderMutation { service, source });
        }
        Ok(canonical)
    }
}

/// Resolves enabled plugins and fans operations out to them.
pub(crate) struct Dispatcher {
    registry: Arc<PluginRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, services: &ServicesConfig) -> Fanout {
        Fanout {
            plugins: self.registry.enabled_plugins(services),
        }
    }

    pub async fn dispatch(
        &self,
        operation: ListOperation,
        services: &ServicesConfig,
    ) -> Result<Option<ListEntry>, SyncError> {
        self.resolve(services).run(operation).await
    }

    /// Read one entry through the main plugin.
    pub async fn get_list_entry(
        &self,
        media_id: u64,
        services: &ServicesConfig,
    ) -> Result<Option<ListEntry>, SyncError> {
        let plugin = self.registry.main_plugin(services)?;
        plugin
            .get_list_entry(media_id)
            .await
            .map_err(|source| SyncError::ProviderMutation {
                service: plugin.service().to_string(),
                source,
            })
    }

    /// Read a page of entries through the main plugin.
    pub async fn get_list_entries(
        &self,
        filter: ListFilter,
        services: &ServicesConfig,
    ) -> Result<Option<Vec<ListEntry>>, SyncError> {
        let plugin = self.registry.main_plugin(services)?;
        plugin
            .get_list_entries(filter)
            .await
            .map_err(|source| SyncError::ProviderMutation {
                service: plugin.service().to_string(),
                source,
            })
    }
}
