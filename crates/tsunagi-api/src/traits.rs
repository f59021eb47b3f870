//! Capability traits for list-tracking providers and schedule sources.
//!
//! Every list service adapter (AniList, Kitsu, MAL, ...) implements
//! [`ListPlugin`], allowing the runtime to fan a mutation out to all of them
//! without knowing which services exist.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A list-tracking service adapter.
///
/// Each call is independently fallible. Adapters own their retry and
/// timeout policy; callers never retry.
#[async_trait]
pub trait ListPlugin: Send + Sync {
    /// Unique service identifier, e.g. `"anilist"`.
    fn service(&self) -> &str;

    /// Add a media item to the user's list.
    async fn add_to_list(&self, media_id: u64) -> Result<ListEntry, ProviderError>;

    /// Remove a media item from the user's list, returning the removed entry.
    async fn delete_from_list(&self, media_id: u64) -> Result<ListEntry, ProviderError>;

    async fn update_status(
        &self,
        media_id: u64,
        status: ListStatus,
    ) -> Result<ListEntry, ProviderError>;

    /// Set the score, on the provider's own scale.
    async fn update_score(&self, media_id: u64, score: f32) -> Result<ListEntry, ProviderError>;

    /// Set the number of watched episodes.
    async fn update_progress(
        &self,
        media_id: u64,
        progress: u32,
    ) -> Result<ListEntry, ProviderError>;

    /// Reset progress and bump the repeat counter.
    async fn start_rewatching(&self, media_id: u64) -> Result<ListEntry, ProviderError>;

    async fn edit_list_entry(
        &self,
        media_id: u64,
        options: EditOptions,
    ) -> Result<ListEntry, ProviderError>;

    /// Look up the entry for a media item, `None` if it is not on the list.
    async fn get_list_entry(&self, media_id: u64) -> Result<Option<ListEntry>, ProviderError>;

    async fn get_list_entries(
        &self,
        filter: ListFilter,
    ) -> Result<Option<Vec<ListEntry>>, ProviderError>;
}

/// Upstream airing schedule data.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// The next not-yet-aired episode of a media item, if one is scheduled.
    async fn next_airing(&self, media_id: u64) -> Result<Option<AiringSchedule>, ProviderError>;
}

/// Status of a list entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListStatus {
    #[default]
    Current,
    Planning,
    Completed,
    Paused,
    Dropped,
    Repeating,
}

impl ListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "CURRENT",
            Self::Planning => "PLANNING",
            Self::Completed => "COMPLETED",
            Self::Paused => "PAUSED",
            Self::Dropped => "DROPPED",
            Self::Repeating => "REPEATING",
        }
    }
}

impl std::fmt::Display for ListStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's relationship to one media item on one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    /// Provider-side entry ID.
    pub id: u64,
    pub media_id: u64,
    pub status: ListStatus,
    pub progress: u32,
    pub score: f32,
    pub repeat: u32,
    /// Service identifier of the provider that owns this entry.
    pub service: String,
}

/// Partial update for [`ListPlugin::edit_list_entry`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOptions {
    pub status: Option<ListStatus>,
    pub progress: Option<u32>,
    pub score: Option<f32>,
    pub repeat: Option<u32>,
    pub notes: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Arguments for [`ListPlugin::get_list_entries`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    pub status: Option<ListStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// The next not-yet-aired episode of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringSchedule {
    pub id: u64,
    pub episode: u32,
    /// Unix timestamp in seconds.
    pub airing_at: i64,
}
