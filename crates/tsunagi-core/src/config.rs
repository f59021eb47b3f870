use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TsunagiError;
use crate::models::EpisodeProvider;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub services: ServicesConfig,
    pub episodes: EpisodesConfig,
    pub schedule: ScheduleConfig,
    pub cache: CacheConfig,
}

/// Which list providers receive mutations and which one serves reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub primary: String,
    pub enabled: Vec<String>,
}

impl ServicesConfig {
    pub fn is_enabled(&self, service: &str) -> bool {
        self.enabled.iter().any(|s| s == service)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodesConfig {
    pub provider: EpisodeProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub persistent: bool,
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults.
    pub fn load() -> Result<Self, TsunagiError> {
        let user_path = Self::config_path();
        if !user_path.exists() {
            return Self::parse("");
        }
        let user_str = std::fs::read_to_string(&user_path)?;
        Self::parse(&user_str)
    }

    /// Parse a user config, filling every missing key from the defaults.
    pub fn parse(user: &str) -> Result<Self, TsunagiError> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| TsunagiError::Config(e.to_string()))?;
        let user: toml::Table =
            toml::from_str(user).map_err(|e| TsunagiError::Config(e.to_string()))?;
        merge_tables(&mut merged, user);

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| TsunagiError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), TsunagiError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TsunagiError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the persistent query cache.
    pub fn cache_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.cache_dir().join("query-cache.db"))
            .unwrap_or_else(|| PathBuf::from("query-cache.db"))
    }

    /// Ensure the cache directory exists and return the cache path.
    pub fn ensure_cache_path() -> Result<PathBuf, TsunagiError> {
        let path = Self::cache_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "tsunagi")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert_eq!(config.services.primary, "anilist");
        assert!(config.services.is_enabled("anilist"));
        assert!(!config.services.is_enabled("kitsu"));
        assert_eq!(config.episodes.provider, EpisodeProvider::Crunchyroll);
        assert!(config.schedule.enabled);
        assert!(config.cache.persistent);
    }

    #[test]
    fn test_partial_user_config_keeps_defaults() {
        let config = AppConfig::parse(
            r#"
            [services]
            enabled = ["anilist", "mal"]
            "#,
        )
        .unwrap();
        assert_eq!(config.services.primary, "anilist");
        assert_eq!(config.services.enabled, vec!["anilist", "mal"]);
        assert_eq!(config.schedule.endpoint, "https://graphql.anilist.co");
    }

    #[test]
    fn test_invalid_user_config() {
        let err = AppConfig::parse("[services]\nenabled = 3").unwrap_err();
        assert!(matches!(err, TsunagiError::Config(_)));
    }

    #[test]
    fn test_roundtrip() {
        let config = AppConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.services.enabled, config.services.enabled);
        assert_eq!(deserialized.episodes.provider, config.episodes.provider);
    }
}
