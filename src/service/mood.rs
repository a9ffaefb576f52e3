//! Mood entries with offline fallback

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{
        constant::namespace,
        error::MehError,
        event::{EventPayload, MoodCreatedData},
        mutation::{CreateMoodEntryRequest, MoodEntry, MoodMutation}
    },
    port::{network::NetworkStatus, remote::RemoteApi, storage::QueueStorage},
    service::{
        event_bus::EventEmitter,
        offline_queue::{MutationProcessor, OfflineQueue, SyncOutcome, SyncPolicy}
    }
};

async fn create_mood_entry(
    api: &dyn RemoteApi,
    events: Option<&EventEmitter>,
    request: &CreateMoodEntryRequest
) -> Result<MoodEntry, MehError> {
    let entry = api.create_mood_entry(request).await?;

    if let Some(events) = events {
        events
            .emit(EventPayload::MoodCreated(MoodCreatedData {
                entry_id: entry.id,
                user_id:  None,
                score:    entry.score,
                date:     entry.date
            }));
    }
    Ok(entry)
}

pub struct MoodReplayer {
    api:    Arc<dyn RemoteApi>,
    events: Option<EventEmitter>
}

#[async_trait]
impl MutationProcessor<MoodMutation> for MoodReplayer {
    async fn process(&self, mutation: &MoodMutation) -> Result<(), MehError> {
        match mutation {
            MoodMutation::Create(request) => {
                create_mood_entry(self.api.as_ref(), self.events.as_ref(), request).await?;
            }
        }
        Ok(())
    }
}

/// Mood operations that fall back to the offline queue
pub struct MoodSync {
    api:    Arc<dyn RemoteApi>,
    events: Option<EventEmitter>,
    queue:  Arc<OfflineQueue<MoodMutation>>
}

impl MoodSync {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        storage: Option<Arc<dyn QueueStorage>>,
        network: Arc<dyn NetworkStatus>,
        policy: SyncPolicy,
        events: Option<EventEmitter>
    ) -> Self {
        let replayer = Arc::new(MoodReplayer { api: api.clone(), events: events.clone() });
        let queue = Arc::new(OfflineQueue::new(namespace::MOODS, storage, network, replayer).with_policy(policy));
        Self { api, events, queue }
    }

    /// Record a mood entry; `None` means it was queued for later
    pub async fn create_mood_entry(&self, request: CreateMoodEntryRequest) -> Option<MoodEntry> {
        let mutation = MoodMutation::Create(request.clone());
        self.queue.submit(mutation, || create_mood_entry(self.api.as_ref(), self.events.as_ref(), &request)).await
    }

    pub fn queue(&self) -> &Arc<OfflineQueue<MoodMutation>> {
        &self.queue
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn is_syncing(&self) -> bool {
        self.queue.is_syncing()
    }

    pub async fn sync_queue(&self) -> SyncOutcome {
        self.queue.sync_queue().await
    }
}
