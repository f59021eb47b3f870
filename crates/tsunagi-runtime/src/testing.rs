//! Hand-written fakes shared by the runtime's unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tsunagi_api::{
    AiringSchedule, EditOptions, ListEntry, ListFilter, ListPlugin, ListStatus, ProviderError,
    ScheduleSource,
};
use tsunagi_core::config::ServicesConfig;
use tsunagi_core::error::TsunagiError;

use crate::episodes::{EpisodeStore, SaveEpisodes};

pub fn services(primary: &str, enabled: &[&str]) -> ServicesConfig {
    ServicesConfig {
        primary: primary.to_string(),
        enabled: enabled.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn entry(service: &str, media_id: u64) -> ListEntry {
    ListEntry {
        id: media_id,
        media_id,
        status: ListStatus::Current,
        progress: 0,
        score: 0.0,
        repeat: 0,
        service: service.to_string(),
    }
}

/// A call received by [`FakePlugin`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Add(u64),
    Delete(u64),
    UpdateStatus(u64, ListStatus),
    UpdateScore(u64, f32),
    UpdateProgress(u64, u32),
    StartRewatching(u64),
    Edit(u64, EditOptions),
    Get(u64),
    GetAll,
}

/// In-memory list provider that records every call.
pub struct FakePlugin {
    service: String,
    entry_id: Option<u64>,
    fail: bool,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<Call>>,
    remote: Mutex<HashMap<u64, ListEntry>>,
}

impl FakePlugin {
    fn build(service: &str) -> Self {
        Self {
            service: service.to_string(),
            entry_id: None,
            fail: false,
            gate: None,
            calls: Mutex::new(Vec::new()),
            remote: Mutex::new(HashMap::new()),
        }
    }

    pub fn new(service: &str) -> Arc<Self> {
        Arc::new(Self::build(service))
    }

    /// Every mutation fails with a 503 and changes nothing remotely.
    pub fn failing(service: &str) -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::build(service)
        })
    }

    /// New entries get `entry_id` instead of the media id.
    pub fn numbered(service: &str, entry_id: u64) -> Arc<Self> {
        Arc::new(Self {
            entry_id: Some(entry_id),
            ..Self::build(service)
        })
    }

    /// Mutations are recorded immediately but only complete once `gate` is notified.
    pub fn gated(service: &str, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(gate),
            ..Self::build(service)
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remote_entry(&self, media_id: u64) -> Option<ListEntry> {
        self.remote.lock().unwrap().get(&media_id).cloned()
    }

    pub fn seed(&self, entry: ListEntry) {
        self.remote.lock().unwrap().insert(entry.media_id, entry);
    }

    fn fresh_entry(&self, media_id: u64) -> ListEntry {
        ListEntry {
            id: self.entry_id.unwrap_or(media_id),
            ..entry(&self.service, media_id)
        }
    }

    async fn mutate(
        &self,
        call: Call,
        media_id: u64,
        apply: impl FnOnce(&mut ListEntry),
    ) -> Result<ListEntry, ProviderError> {
        self.calls.lock().unwrap().push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(ProviderError::Api {
                status: 503,
                message: format!("{} is unavailable", self.service),
            });
        }

        let mut remote = self.remote.lock().unwrap();
        let entry = remote
            .entry(media_id)
            .or_insert_with(|| self.fresh_entry(media_id));
        apply(entry);
        Ok(entry.clone())
    }
}

#[async_trait]
impl ListPlugin for FakePlugin {
    fn service(&self) -> &str {
        &self.service
    }

    async fn add_to_list(&self, media_id: u64) -> Result<ListEntry, ProviderError> {
        self.mutate(Call::Add(media_id), media_id, |_| {}).await
    }

    async fn delete_from_list(&self, media_id: u64) -> Result<ListEntry, ProviderError> {
        let removed = self.mutate(Call::Delete(media_id), media_id, |_| {}).await?;
        self.remote.lock().unwrap().remove(&media_id);
        Ok(removed)
    }

    async fn update_status(
        &self,
        media_id: u64,
        status: ListStatus,
    ) -> Result<ListEntry, ProviderError> {
        self.mutate(Call::UpdateStatus(media_id, status), media_id, |e| {
            e.status = status
        })
        .await
    }

    async fn update_score(&self, media_id: u64, score: f32) -> Result<ListEntry, ProviderError> {
        self.mutate(Call::UpdateScore(media_id, score), media_id, |e| {
            e.score = score
        })
        .await
    }

    async fn update_progress(
        &self,
        media_id: u64,
        progress: u32,
    ) -> Result<ListEntry, ProviderError> {
        self.mutate(Call::UpdateProgress(media_id, progress), media_id, |e| {
            e.progress = progress
        })
        .await
    }

    async fn start_rewatching(&self, media_id: u64) -> Result<ListEntry, ProviderError> {
        self.mutate(Call::StartRewatching(media_id), media_id, |e| {
            e.status = ListStatus::Repeating;
            e.progress = 0;
            e.repeat += 1;
        })
        .await
    }

    async fn edit_list_entry(
        &self,
        media_id: u64,
        options: EditOptions,
    ) -> Result<ListEntry, ProviderError> {
        let call = Call::Edit(media_id, options.clone());
        self.mutate(call, media_id, |e| {
            if let Some(status) = options.status {
                e.status = status;
            }
            if let Some(progress) = options.progress {
                e.progress = progress;
            }
            if let Some(score) = options.score {
                e.score = score;
            }
            if let Some(repeat) = options.repeat {
                e.repeat = repeat;
            }
        })
        .await
    }

    async fn get_list_entry(&self, media_id: u64) -> Result<Option<ListEntry>, ProviderError> {
        self.calls.lock().unwrap().push(Call::Get(media_id));
        Ok(self.remote_entry(media_id))
    }

    async fn get_list_entries(
        &self,
        filter: ListFilter,
    ) -> Result<Option<Vec<ListEntry>>, ProviderError> {
        self.calls.lock().unwrap().push(Call::GetAll);
        let mut entries: Vec<ListEntry> = self
            .remote
            .lock()
            .unwrap()
            .values()
            .filter(|e| filter.status.is_none_or(|s| s == e.status))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.media_id);
        Ok(Some(entries))
    }
}

enum Scripted {
    Airing(AiringSchedule),
    Nothing,
    Fail,
}

/// Schedule source that always gives the same scripted answer.
pub struct FakeSchedule {
    answer: Scripted,
    lookups: Mutex<Vec<u64>>,
}

impl FakeSchedule {
    fn with(answer: Scripted) -> Arc<Self> {
        Arc::new(Self {
            answer,
            lookups: Mutex::new(Vec::new()),
        })
    }

    pub fn airing(episode: u32, airing_at: i64) -> Arc<Self> {
        Self::with(Scripted::Airing(AiringSchedule {
            id: 1,
            episode,
            airing_at,
        }))
    }

    pub fn nothing() -> Arc<Self> {
        Self::with(Scripted::Nothing)
    }

    pub fn failing() -> Arc<Self> {
        Self::with(Scripted::Fail)
    }

    pub fn lookups(&self) -> Vec<u64> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScheduleSource for FakeSchedule {
    async fn next_airing(&self, media_id: u64) -> Result<Option<AiringSchedule>, ProviderError> {
        self.lookups.lock().unwrap().push(media_id);
        match &self.answer {
            Scripted::Airing(schedule) => Ok(Some(*schedule)),
            Scripted::Nothing => Ok(None),
            Scripted::Fail => Err(ProviderError::Other("schedule upstream down".into())),
        }
    }
}

/// Episode store that keeps every request it receives.
#[derive(Default)]
pub struct FakeEpisodeStore {
    saved: Mutex<Vec<SaveEpisodes>>,
}

impl FakeEpisodeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saved(&self) -> Vec<SaveEpisodes> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl EpisodeStore for FakeEpisodeStore {
    async fn save_episodes(&self, request: SaveEpisodes) -> Result<(), TsunagiError> {
        self.saved.lock().unwrap().push(request);
        Ok(())
    }
}
