//! Journal entries with offline fallback
//!
//! Creates and edits share one queue, so an edit queued after a create is
//! never replayed before it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{
        constant::namespace,
        error::MehError,
        event::{EventPayload, JournalCreatedData, JournalUpdatedData},
        mutation::{CreateJournalEntryRequest, JournalEntry, JournalMutation, UpdateJournalEntryRequest}
    },
    port::{network::NetworkStatus, remote::RemoteApi, storage::QueueStorage},
    service::{
        event_bus::EventEmitter,
        offline_queue::{MutationProcessor, OfflineQueue, SyncOutcome, SyncPolicy}
    }
};

/// Call the backend for one journal mutation and announce the confirmed result
async fn apply(
    api: &dyn RemoteApi,
    events: Option<&EventEmitter>,
    mutation: &JournalMutation
) -> Result<JournalEntry, MehError> {
    let (entry, payload) = match mutation {
        JournalMutation::Create(request) => {
            let entry = api.create_journal_entry(request).await?;
            let payload = EventPayload::JournalCreated(JournalCreatedData {
                entry_id: entry.id,
                user_id:  None,
                date:     entry.date
            });
            (entry, payload)
        }
        JournalMutation::Update(request) => {
            let entry = api.update_journal_entry(request).await?;
            let payload = EventPayload::JournalUpdated(JournalUpdatedData { entry_id: entry.id, user_id: None });
            (entry, payload)
        }
    };

    if let Some(events) = events {
        events.emit(payload);
    }
    Ok(entry)
}

pub struct JournalReplayer {
    api:    Arc<dyn RemoteApi>,
    events: Option<EventEmitter>
}

#[async_trait]
impl MutationProcessor<JournalMutation> for JournalReplayer {
    async fn process(&self, mutation: &JournalMutation) -> Result<(), MehError> {
        apply(self.api.as_ref(), self.events.as_ref(), mutation).await.map(|_| ())
    }
}

/// Journal operations that fall back to the offline queue
pub struct JournalSync {
    api:    Arc<dyn RemoteApi>,
    events: Option<EventEmitter>,
    queue:  Arc<OfflineQueue<JournalMutation>>
}

impl JournalSync {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        storage: Option<Arc<dyn QueueStorage>>,
        network: Arc<dyn NetworkStatus>,
        policy: SyncPolicy,
        events: Option<EventEmitter>
    ) -> Self {
        let replayer = Arc::new(JournalReplayer { api: api.clone(), events: events.clone() });
        let queue = Arc::new(OfflineQueue::new(namespace::JOURNAL, storage, network, replayer).with_policy(policy));
        Self { api, events, queue }
    }

    async fn submit(&self, mutation: JournalMutation) -> Option<JournalEntry> {
        let direct = mutation.clone();
        self.queue.submit(mutation, || apply(self.api.as_ref(), self.events.as_ref(), &direct)).await
    }

    /// Write a new entry; `None` means it was queued for later
    pub async fn create_entry(&self, request: CreateJournalEntryRequest) -> Option<JournalEntry> {
        self.submit(JournalMutation::Create(request)).await
    }

    /// Edit an existing entry; `None` means the edit was queued for later
    pub async fn update_entry(&self, request: UpdateJournalEntryRequest) -> Option<JournalEntry> {
        self.submit(JournalMutation::Update(request)).await
    }

    pub fn queue(&self) -> &Arc<OfflineQueue<JournalMutation>> {
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

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::{
        adapter::{event::BroadcastTopic, network::NetworkMonitor, storage::InMemoryQueueStorage},
        domain::event::EventType,
        service::event_bus::EventBus,
        testing::{FakeRemoteApi, RemoteCall}
    };

    fn create(content: &str) -> CreateJournalEntryRequest {
        CreateJournalEntryRequest {
            date:    NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            content: content.to_string(),
            tags:    Vec::new()
        }
    }

    fn update(id: i64, content: &str) -> UpdateJournalEntryRequest {
        UpdateJournalEntryRequest { id, content: Some(content.to_string()), tags: None }
    }

    type Harness = (JournalSync, Arc<FakeRemoteApi>, Arc<NetworkMonitor>);

    fn journal_sync(online: bool, events: Option<EventEmitter>) -> Harness {
        let api = Arc::new(FakeRemoteApi::new());
        let network = Arc::new(NetworkMonitor::new(online));
        let storage = Arc::new(InMemoryQueueStorage::new()) as Arc<dyn QueueStorage>;
        let sync = JournalSync::new(api.clone(), Some(storage), network.clone(), SyncPolicy::default(), events);
        (sync, api, network)
    }

    #[tokio::test]
    async fn test_online_update_returns_the_edited_entry() {
        let (sync, api, _) = journal_sync(true, None);

        let entry = sync.update_entry(update(7, "better")).await.unwrap();

        assert_eq!(entry.id, 7);
        assert_eq!(entry.content, "better");
        assert_eq!(api.calls(), vec![RemoteCall::UpdateJournal(update(7, "better"))]);
        assert_eq!(sync.pending(), 0);
    }

    #[tokio::test]
    async fn test_create_and_update_replay_in_submission_order() {
        let (sync, api, network) = journal_sync(false, None);

        assert!(sync.create_entry(create("draft")).await.is_none());
        assert!(sync.update_entry(update(1, "final")).await.is_none());
        assert_eq!(sync.pending(), 2);

        network.set_online(true);
        sync.sync_queue().await;

        assert_eq!(
            api.calls(),
            vec![RemoteCall::CreateJournal(create("draft")), RemoteCall::UpdateJournal(update(1, "final"))]
        );
        assert_eq!(sync.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_edit_keeps_later_mutations_queued() {
        let (sync, api, network) = journal_sync(false, None);
        sync.update_entry(update(1, "a")).await;
        sync.create_entry(create("b")).await;

        network.set_online(true);
        api.set_failing(true);
        let outcome = sync.sync_queue().await;

        assert!(outcome.report().unwrap().stalled());
        assert_eq!(api.calls().len(), 1);
        assert_eq!(sync.pending(), 2);
    }

    #[tokio::test]
    async fn test_journal_events_follow_the_mutation_kind() {
        let topic = Arc::new(BroadcastTopic::new());
        let mut announced = topic.subscribe();
        let bus = Arc::new(EventBus::new().with_sink(topic));

        let (sync, _, _) = journal_sync(true, Some(EventEmitter::new(bus, "journal-page")));
        sync.create_entry(create("hello")).await.unwrap();
        sync.update_entry(update(1, "hello again")).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let (_, event) = tokio::time::timeout(Duration::from_secs(5), announced.recv()).await.unwrap().unwrap();
            seen.push(event.event_type());
        }
        assert!(seen.contains(&EventType::JournalCreated));
        assert!(seen.contains(&EventType::JournalUpdated));
    }
}
