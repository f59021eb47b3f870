//! Keeps the local query cache consistent with list mutations.
//!
//! Every strategy reduces to a sequence of [`CacheEffect`]s, applied in
//! order. Each effect is one read-modify-write against the cache; nothing is
//! held across the suspension points between effects, so two concurrent
//! patches of the same document resolve last-write-wins.

use std::sync::Arc;

use serde_json::{json, Value};
use tsunagi_api::{ListEntry, ListStatus};
use tsunagi_core::cache::{QueryCache, QueryShape};
use tsunagi_core::error::TsunagiError;
use tsunagi_core::models::{EpisodeProgress, EpisodeProvider};

use crate::SyncError;

/// One change to the local cache.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CacheEffect {
    /// Overwrite the entry slot for a media item.
    WriteEntry { media_id: u64, entry: ListEntry },
    /// Mark the entry slot for a media item stale.
    RefetchEntry { media_id: u64 },
    /// Mark the cached anime page for a media item stale.
    RefetchAnimePage { media_id: u64 },
    /// Replace `anime.mediaListEntry` on the cached anime page, if one is cached.
    PatchMediaListEntry {
        media_id: u64,
        entry: Option<ListEntry>,
    },
    /// Mark every cached list page stale.
    RefetchLists,
    /// Mark the episode list of one (media, provider) pair stale.
    RefetchEpisodeList {
        anime_id: u64,
        provider: EpisodeProvider,
    },
    WriteEpisodeProgress(EpisodeProgress),
}

/// Values already known for an entry, used to fill a provisional one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriorValues {
    pub id: Option<u64>,
    pub progress: Option<u32>,
    pub repeat: Option<u32>,
    pub status: Option<ListStatus>,
}

/// Patch the canonical entry into the entry slot and the anime page.
/// List pages are not touched; callers add [`CacheEffect::RefetchLists`].
pub(crate) fn settle_entry(media_id: u64, entry: &ListEntry) -> Vec<CacheEffect> {
    vec![
        CacheEffect::WriteEntry {
            media_id,
            entry: entry.clone(),
        },
        CacheEffect::PatchMediaListEntry {
            media_id,
            entry: Some(entry.clone()),
        },
    ]
}

/// Every cached document embedding the entry refetches; nothing is patched.
pub(crate) fn refetch_entry(media_id: u64) -> Vec<CacheEffect> {
    vec![
        CacheEffect::RefetchEntry { media_id },
        CacheEffect::RefetchAnimePage { media_id },
        CacheEffect::RefetchLists,
    ]
}

/// Build the entry shown while a score update is in flight.
pub(crate) fn provisional_score_entry(
    media_id: u64,
    score: f32,
    prior: &PriorValues,
    service: &str,
) -> ListEntry {
    ListEntry {
        id: prior.id.unwrap_or_default(),
        media_id,
        status: prior.status.unwrap_or(ListStatus::Current),
        progress: prior.progress.unwrap_or(0),
        score,
        repeat: prior.repeat.unwrap_or(0),
        service: service.to_string(),
    }
}

pub fn entry_variables(media_id: u64) -> Value {
    json!({ "mediaId": media_id })
}

pub fn anime_page_variables(media_id: u64) -> Value {
    json!({ "id": media_id })
}

pub fn episode_list_variables(anime_id: u64, provider: EpisodeProvider) -> Value {
    json!({ "id": anime_id, "provider": provider })
}

pub fn episode_progress_variables(progress: &EpisodeProgress) -> Value {
    json!({
        "provider": progress.provider,
        "animeId": progress.anime_id,
        "episodeNumber": progress.episode_number,
    })
}

fn to_document<T: serde::Serialize>(value: &T) -> Result<Value, TsunagiError> {
    Ok(serde_json::to_value(value)?)
}

pub(crate) struct CacheReconciler {
    cache: Arc<dyn QueryCache>,
}

impl CacheReconciler {
    pub fn new(cache: Arc<dyn QueryCache>) -> Self {
        Self { cache }
    }

    pub async fn apply(&self, effects: &[CacheEffect]) -> Result<(), SyncError> {
        for effect in effects {
            self.apply_one(effect).await?;
        }
        Ok(())
    }

    async fn apply_one(&self, effect: &CacheEffect) -> Result<(), SyncError> {
        match effect {
            CacheEffect::WriteEntry { media_id, entry } => {
                self.cache
                    .write(
                        QueryShape::ListEntry,
                        &entry_variables(*media_id),
                        to_document(entry)?,
                    )
                    .await?;
            }
            CacheEffect::RefetchEntry { media_id } => {
                self.cache
                    .invalidate(QueryShape::ListEntry, Some(&entry_variables(*media_id)))
                    .await?;
            }
            CacheEffect::RefetchAnimePage { media_id } => {
                self.cache
                    .invalidate(QueryShape::AnimePage, Some(&anime_page_variables(*media_id)))
                    .await?;
            }
            CacheEffect::PatchMediaListEntry { media_id, entry } => {
                self.patch_media_list_entry(*media_id, entry.as_ref())
                    .await?;
            }
            CacheEffect::RefetchLists => {
                let marked = self.cache.invalidate(QueryShape::ListEntries, None).await?;
                tracing::debug!(marked, "Marked list queries for refetch");
            }
            CacheEffect::RefetchEpisodeList { anime_id, provider } => {
                let vars = episode_list_variables(*anime_id, *provider);
                self.cache
                    .invalidate(QueryShape::EpisodeList, Some(&vars))
                    .await?;
            }
            CacheEffect::WriteEpisodeProgress(progress) => {
                self.cache
                    .write(
                        QueryShape::EpisodeProgress,
                        &episode_progress_variables(progress),
                        to_document(progress)?,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// A page that was never cached has nothing stale to fix, so a miss is a no-op.
    async fn patch_media_list_entry(
        &self,
        media_id: u64,
        entry: Option<&ListEntry>,
    ) -> Result<(), SyncError> {
        let vars = anime_page_variables(media_id);
        let Some(mut document) = self.cache.read(QueryShape::AnimePage, &vars).await? else {
            tracing::debug!(media_id, "Anime page not cached, nothing to patch");
            return Ok(());
        };

        let Some(anime) = document.get_mut("anime").and_then(Value::as_object_mut) else {
            tracing::debug!(media_id, "Cached anime page has no anime, nothing to patch");
            return Ok(());
        };

        let value = match entry {
            Some(entry) => to_document(entry)?,
            None => Value::Null,
        };
        anime.insert("mediaListEntry".into(), value);

        self.cache
            .write(QueryShape::AnimePage, &vars, document)
            .await?;
        Ok(())
    }
}
