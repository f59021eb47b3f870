use std::sync::Arc;

use chrono::{DateTime, Utc};
use tsunagi_api::anilist::AniListSchedule;
use tsunagi_api::{ProviderError, ScheduleSource};
use tsunagi_core::config::ScheduleConfig;

/// Looks up when the next episode of a show airs.
///
/// Schedule data is advisory: a missing source, an upstream error and a show
/// with nothing scheduled all come back as `None`.
#[derive(Clone, Default)]
pub struct AiringLookup {
    source: Option<Arc<dyn ScheduleSource>>,
}

impl AiringLookup {
    pub fn new(source: Arc<dyn ScheduleSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Build the AniList-backed lookup described by `[schedule]`.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ProviderError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let client = AniListSchedule::new(&config.endpoint)?;
        Ok(Self::new(Arc::new(client)))
    }

    /// A lookup that never finds anything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }

    pub async fn next_airing(&self, anime_id: u64) -> Option<DateTime<Utc>> {
        let source = self.source.as_ref()?;

        let schedule = match source.next_airing(anime_id).await {
            Ok(Some(schedule)) => schedule,
            Ok(None) => {
                tracing::debug!(anime_id, "No upcoming episode scheduled");
                return None;
            }
            Err(e) => {
                tracing::debug!(anime_id, error = %e, "Airing lookup failed, ignoring");
                return None;
            }
        };

        if schedule.airing_at <= 0 {
            return None;
        }
        let airing_at = DateTime::from_timestamp(schedule.airing_at, 0)?;
        tracing::debug!(
            anime_id,
            episode = schedule.episode,
            airing_at = %airing_at,
            "Found next airing"
        );
        Some(airing_at)
    }

    /// Same as [`Self::next_airing`], as epoch milliseconds.
    pub async fn next_airing_millis(&self, anime_id: u64) -> Option<i64> {
        self.next_airing(anime_id)
            .await
            .map(|at| at.timestamp_millis())
    }
}

impl std::fmt::Debug for AiringLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiringLookup")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSchedule;

    #[tokio::test]
    async fn test_scheduled_episode() {
        let lookup = AiringLookup::new(FakeSchedule::airing(5, 1_700_000_000));
        let at = lookup.next_airing(21).await.unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(
            lookup.next_airing_millis(21).await,
            Some(1_700_000_000_000)
        );
    }

    #[tokio::test]
    async fn test_nothing_scheduled() {
        let lookup = AiringLookup::new(FakeSchedule::nothing());
        assert!(lookup.next_airing(21).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_timestamp_is_absent() {
        let lookup = AiringLookup::new(FakeSchedule::airing(1, 0));
        assert!(lookup.next_airing_millis(21).await.is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_is_swallowed() {
        let schedule = FakeSchedule::failing();
        let lookup = AiringLookup::new(schedule.clone());
        assert!(lookup.next_airing(21).await.is_none());
        assert_eq!(schedule.lookups(), vec![21]);
    }

    #[test]
    fn test_from_config() {
        let mut config = ScheduleConfig {
            enabled: true,
            endpoint: "https://graphql.anilist.co".into(),
        };
        assert!(AiringLookup::from_config(&config).unwrap().is_enabled());

        config.enabled = false;
        assert!(!AiringLookup::from_config(&config).unwrap().is_enabled());

        config.enabled = true;
        config.endpoint = "not a url".into();
        assert!(AiringLookup::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_disabled() {
        let lookup = AiringLookup::disabled();
        assert!(!lookup.is_enabled());
        assert!(lookup.next_airing(21).await.is_none());
    }
}
