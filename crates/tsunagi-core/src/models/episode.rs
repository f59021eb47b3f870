use serde::{Deserialize, Serialize};

/// Streaming service an episode list was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeProvider {
    Crunchyroll,
    Hidive,
}

impl EpisodeProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crunchyroll => "crunchyroll",
            Self::Hidive => "hidive",
        }
    }
}

impl std::fmt::Display for EpisodeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One episode as scraped from a streaming provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeInput {
    pub id: String,
    pub anime_id: u64,
    pub title: String,
    pub index: u32,
    pub episode_number: u32,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    /// Length in seconds.
    pub duration: Option<u32>,
}

/// Last-known watch marker for one episode, keyed by
/// (provider, anime, episode number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeProgress {
    pub provider: EpisodeProvider,
    pub anime_id: u64,
    pub episode_number: u32,
    pub progress: u32,
}
