mod airing;
mod dispatcher;
mod episodes;
mod reconciler;
mod registry;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tsunagi_api::{EditOptions, ListEntry, ListFilter, ListStatus, ProviderError, ScheduleSource};
use tsunagi_core::cache::QueryCache;
use tsunagi_core::config::AppConfig;
use tsunagi_core::error::TsunagiError;
use tsunagi_core::models::{EpisodeInput, EpisodeProgress, EpisodeProvider};

use dispatcher::{Dispatcher, ListOperation};
use reconciler::{refetch_entry, settle_entry, CacheEffect, CacheReconciler};

pub use airing::AiringLookup;
pub use episodes::{EpisodeStore, SaveEpisodes};
pub use reconciler::{
    anime_page_variables, entry_variables, episode_list_variables, episode_progress_variables,
    PriorValues,
};
pub use registry::PluginRegistry;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no list provider registered for main service `{service}`")]
    NoProviderConfigured { service: String },

    #[error("list provider `{service}` is already registered")]
    DuplicateProvider { service: String },

    #[error("{service} failed to apply list mutation: {source}")]
    ProviderMutation {
        service: String,
        #[source]
        source: ProviderError,
    },

    #[error("cache error: {0}")]
    Cache(#[from] TsunagiError),
}

/// Entry point for every list mutation.
///
/// Each operation fans out to the enabled providers, then brings the local
/// query cache in line with the result.
pub struct ListSync {
    config: Arc<RwLock<AppConfig>>,
    dispatcher: Dispatcher,
    reconciler: CacheReconciler,
    airing: AiringLookup,
    episodes: Arc<dyn EpisodeStore>,
}

impl ListSync {
    pub fn new(
        config: AppConfig,
        registry: Arc<PluginRegistry>,
        cache: Arc<dyn QueryCache>,
        episodes: Arc<dyn EpisodeStore>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            dispatcher: Dispatcher::new(registry),
            reconciler: CacheReconciler::new(cache),
            airing: AiringLookup::disabled(),
            episodes,
        }
    }

    pub fn with_schedule(mut self, source: Arc<dyn ScheduleSource>) -> Self {
        self.airing = AiringLookup::new(source);
        self
    }

    pub async fn get_config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Swap the in-memory config. Takes effect from the next operation on.
    pub async fn update_config(&self, new_config: AppConfig) {
        *self.config.write().await = new_config;
    }

    pub async fn add_to_list(&self, media_id: u64) -> Result<Option<ListEntry>, SyncError> {
        let config = self.get_config().await;
        let Some(entry) = self
            .dispatcher
            .dispatch(ListOperation::AddToList { media_id }, &config.services)
            .await?
        else {
            return Ok(None);
        };

        self.settle(media_id, &entry, true).await?;
        Ok(Some(entry))
    }

    /// Remove from every list. Nothing is patched; every cached copy of the
    /// entry refetches.
    pub async fn remove_from_list(&self, media_id: u64) -> Result<Option<ListEntry>, SyncError> {
        let config = self.get_config().await;
        let Some(entry) = self
            .dispatcher
            .dispatch(ListOperation::DeleteFromList { media_id }, &config.services)
            .await?
        else {
            return Ok(None);
        };

        self.reconciler.apply(&refetch_entry(media_id)).await?;
        Ok(Some(entry))
    }

    /// Remove from every list and clear the entry on the cached anime page.
    pub async fn delete_entry(&self, media_id: u64) -> Result<Option<ListEntry>, SyncError> {
        let config = self.get_config().await;
        let Some(entry) = self
            .dispatcher
            .dispatch(ListOperation::DeleteFromList { media_id }, &config.services)
            .await?
        else {
            return Ok(None);
        };

        self.reconciler
            .apply(&[
                CacheEffect::RefetchEntry { media_id },
                CacheEffect::PatchMediaListEntry {
                    media_id,
                    entry: None,
                },
                CacheEffect::RefetchLists,
            ])
            .await?;
        Ok(Some(entry))
    }

    pub async fn set_status(
        &self,
        media_id: u64,
        status: ListStatus,
    ) -> Result<Option<ListEntry>, SyncError> {
        let config = self.get_config().await;
        let Some(entry) = self
            .dispatcher
            .dispatch(
                ListOperation::UpdateStatus { media_id, status },
                &config.services,
            )
            .await?
        else {
            return Ok(None);
        };

        self.reconciler.apply(&refetch_entry(media_id)).await?;
        Ok(Some(entry))
    }

    /// Update the score everywhere.
    ///
    /// A provisional entry built from `prior` is written to the cache before
    /// any provider is called. It is overwritten by the canonical entry on
    /// success and left in place on failure.
    pub async fn set_score(
        &self,
        media_id: u64,
        score: f32,
        prior: PriorValues,
    ) -> Result<Option<ListEntry>, SyncError> {
        let config = self.get_config().await;
        let fanout = self.dispatcher.resolve(&config.services);
        if fanout.is_empty() {
            tracing::debug!(media_id, "No list providers enabled, skipping score update");
            return Ok(None);
        }

        let provisional =
            reconciler::provisional_score_entry(media_id, score, &prior, &config.services.primary);
        self.reconciler
            .apply(&[CacheEffect::WriteEntry {
                media_id,
                entry: provisional,
            }])
            .await?;

        let Some(entry) = fanout
            .run(ListOperation::UpdateScore { media_id, score })
            .await?
        else {
            return Ok(None);
        };

        self.settle(media_id, &entry, true).await?;
        Ok(Some(entry))
    }

    /// Update watched episodes, clamped to `total_episodes` when it is known.
    pub async fn set_progress(
        &self,
        media_id: u64,
        progress: u32,
        total_episodes: Option<u32>,
    ) -> Result<Option<ListEntry>, SyncError> {
        let progress = match total_episodes {
            Some(total) if total > 0 && progress > total => {
                tracing::warn!(media_id, progress, total, "Progress past last episode, clamping");
                total
            }
            _ => progress,
        };

        let config = self.get_config().await;
        let Some(entry) = self
            .dispatcher
            .dispatch(
                ListOperation::UpdateProgress { media_id, progress },
                &config.services,
            )
            .await?
        else {
            return Ok(None);
        };

        self.settle(media_id, &entry, true).await?;
        Ok(Some(entry))
    }

    /// Start a rewatch. Every cached copy of the entry refetches, and the
    /// cached episode progress for the show resets to episode 0.
    pub async fn start_rewatch(&self, media_id: u64) -> Result<Option<ListEntry>, SyncError> {
        let config = self.get_config().await;
        let Some(entry) = self
            .dispatcher
            .dispatch(ListOperation::StartRewatching { media_id }, &config.services)
            .await?
        else {
            return Ok(None);
        };

        let mut effects = refetch_entry(media_id);
        effects.push(CacheEffect::WriteEpisodeProgress(EpisodeProgress {
            provider: config.episodes.provider,
            anime_id: entry.media_id,
            episode_number: 0,
            progress: 0,
        }));
        self.reconciler.apply(&effects).await?;
        Ok(Some(entry))
    }

    /// Apply several field changes at once. List pages only refetch when a
    /// field they show changes; a notes or date edit leaves them alone.
    pub async fn edit_entry(
        &self,
        media_id: u64,
        options: EditOptions,
    ) -> Result<Option<ListEntry>, SyncError> {
        let list_fields_changed = options.status.is_some()
            || options.progress.is_some()
            || options.score.is_some()
            || options.repeat.is_some();
        let config = self.get_config().await;
        let Some(entry) = self
            .dispatcher
            .dispatch(
                ListOperation::EditListEntry { media_id, options },
                &config.services,
            )
            .await?
        else {
            return Ok(None);
        };

        self.settle(media_id, &entry, list_fields_changed).await?;
        Ok(Some(entry))
    }

    /// Store a scraped episode list, annotated with the next airing time.
    pub async fn cache_episodes(
        &self,
        anime_id: u64,
        provider: EpisodeProvider,
        episodes: Vec<EpisodeInput>,
    ) -> Result<(), SyncError> {
        let config = self.get_config().await;
        let next_episode_airing_at = if config.schedule.enabled {
            self.airing.next_airing_millis(anime_id).await
        } else {
            None
        };

        tracing::debug!(
            anime_id,
            provider = %provider,
            episodes = episodes.len(),
            next_episode_airing_at,
            "Caching episode list"
        );
        self.episodes
            .save_episodes(SaveEpisodes {
                anime_id,
                provider,
                episodes,
                next_episode_airing_at,
            })
            .await?;

        self.reconciler
            .apply(&[CacheEffect::RefetchEpisodeList { anime_id, provider }])
            .await
    }

    pub async fn get_list_entry(&self, media_id: u64) -> Result<Option<ListEntry>, SyncError> {
        let config = self.get_config().await;
        self.dispatcher
            .get_list_entry(media_id, &config.services)
            .await
    }

    pub async fn get_list_entries(
        &self,
        filter: ListFilter,
    ) -> Result<Option<Vec<ListEntry>>, SyncError> {
        let config = self.get_config().await;
        self.dispatcher
            .get_list_entries(filter, &config.services)
            .await
    }

    pub async fn next_airing(&self, anime_id: u64) -> Option<DateTime<Utc>> {
        if !self.get_config().await.schedule.enabled {
            return None;
        }
        self.airing.next_airing(anime_id).await
    }

    async fn settle(
        &self,
        media_id: u64,
        entry: &ListEntry,
        refetch_lists: bool,
    ) -> Result<(), SyncError> {
        let mut effects = settle_entry(media_id, entry);
        if refetch_lists {
            effects.push(CacheEffect::RefetchLists);
        }
        self.reconciler.apply(&effects).await
    }
}
