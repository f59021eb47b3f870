use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tsunagi_core::error::TsunagiError;
use tsunagi_core::models::{EpisodeInput, EpisodeProvider};

/// One batch of scraped episodes for a show, as handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEpisodes {
    pub anime_id: u64,
    pub provider: EpisodeProvider,
    pub episodes: Vec<EpisodeInput>,
    /// Epoch milliseconds, or `None` when no upcoming episode is known.
    pub next_episode_airing_at: Option<i64>,
}

/// Backend that persists scraped episode lists.
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    async fn save_episodes(&self, request: SaveEpisodes) -> Result<(), TsunagiError>;
}
