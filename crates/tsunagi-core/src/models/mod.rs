mod episode;

pub use episode::{EpisodeInput, EpisodeProgress, EpisodeProvider};
