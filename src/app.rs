//! Application container
//!
//! Builds the event bus, queue storage, network monitor, remote client and
//! the three domain wrappers once and hands out shared references.

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    adapter::{
        event::{BroadcastTopic, LoggingEventHandler, StatisticsEventHandler},
        network::{HttpProbe, NetworkMonitor},
        remote::ReqwestRemoteApi,
        storage::{QueueStorageFactory, QueueStorageType}
    },
    config::Settings,
    domain::{error::MehError, event::EventType, mutation::Describe},
    port::{network::NetworkStatus, remote::RemoteApi, storage::QueueStorage},
    service::{
        event_bus::{EventBus, EventEmitter},
        journal::JournalSync,
        mood::MoodSync,
        offline_queue::{OfflineQueue, QueueEntry, QueueStatus, SyncOutcome},
        task::TaskSync
    }
};

/// The three mutation queues, as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum QueueKind {
    Tasks,
    Moods,
    Journal
}

impl QueueKind {
    pub const ALL: [QueueKind; 3] = [QueueKind::Tasks, QueueKind::Moods, QueueKind::Journal];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Tasks => "tasks",
            QueueKind::Moods => "moods",
            QueueKind::Journal => "journal"
        }
    }
}

/// One queued mutation, flattened for display
#[derive(Debug, Clone, PartialEq)]
pub struct EntryView {
    pub key:         u64,
    pub kind:        &'static str,
    pub summary:     String,
    pub attempts:    u32,
    pub last_error:  Option<String>,
    pub enqueued_at: DateTime<Utc>
}

impl EntryView {
    fn new<M: Describe>(key: u64, entry: QueueEntry<M>) -> Self {
        Self {
            key,
            kind: entry.mutation.kind(),
            summary: entry.mutation.summary(),
            attempts: entry.attempts,
            last_error: entry.last_error,
            enqueued_at: entry.enqueued_at
        }
    }
}

async fn list_queue<M>(queue: &OfflineQueue<M>, dead: bool) -> Result<Vec<EntryView>, MehError>
where
    M: Describe + Serialize + DeserializeOwned + Send + Sync + 'static
{
    let entries = if dead { queue.dead_letters().await? } else { queue.entries().await? };
    Ok(entries.into_iter().map(|(key, entry)| EntryView::new(key, entry)).collect())
}

/// Application container that holds all dependencies
pub struct App {
    pub settings:   Settings,
    pub event_bus:  Arc<EventBus>,
    pub statistics: Arc<StatisticsEventHandler>,
    pub topic:      Arc<BroadcastTopic>,
    pub network:    Arc<NetworkMonitor>,
    pub tasks:      TaskSync,
    pub moods:      MoodSync,
    pub journal:    JournalSync,
    probe:          Option<HttpProbe>
}

impl App {
    /// Wire the production adapters described by `settings`
    pub fn new(settings: Settings) -> Result<Self, MehError> {
        let api = Arc::new(ReqwestRemoteApi::new(&settings.api.base_url, settings.request_timeout())?);
        let probe = HttpProbe::new(settings.health_url(), settings.request_timeout())?;

        let storage_path = match settings.storage.backend {
            QueueStorageType::InMemory => None,
            QueueStorageType::RocksDb => Some(settings.storage_path()?)
        };
        let storage = QueueStorageFactory::create_or_disable(settings.storage.backend, storage_path.as_deref());

        let mut app = Self::with_adapters(settings, api, storage, Arc::new(NetworkMonitor::new(false)));
        app.probe = Some(probe);
        Ok(app)
    }

    /// Wire the container around caller-supplied adapters
    pub fn with_adapters(
        settings: Settings,
        api: Arc<dyn RemoteApi>,
        storage: Option<Arc<dyn QueueStorage>>,
        network: Arc<NetworkMonitor>
    ) -> Self {
        let topic = Arc::new(BroadcastTopic::new());
        let mut bus = EventBus::new().with_sink(topic.clone());
        if let Some(max) = settings.bus.max_concurrent_handlers {
            bus = bus.with_max_concurrent_handlers(max);
        }
        let event_bus = Arc::new(bus);

        let logging = Arc::new(LoggingEventHandler::new());
        let statistics = Arc::new(StatisticsEventHandler::new());
        for event_type in EventType::ALL {
            event_bus.subscribe(event_type, logging.clone());
            event_bus.subscribe(event_type, statistics.clone());
        }

        let events = Some(EventEmitter::new(event_bus.clone(), settings.bus.source.clone()));
        let policy = settings.sync_policy();
        let status = network.clone() as Arc<dyn NetworkStatus>;

        let tasks = TaskSync::new(api.clone(), storage.clone(), status.clone(), policy, events.clone());
        let moods = MoodSync::new(api.clone(), storage.clone(), status.clone(), policy, events.clone());
        let journal = JournalSync::new(api, storage, status, policy, events);

        Self { settings, event_bus, statistics, topic, network, tasks, moods, journal, probe: None }
    }

    /// Decide reachability once: forced offline, or whatever the health probe says
    pub async fn detect_network(&self, force_offline: bool) -> bool {
        if force_offline {
            self.network.set_online(false);
            return false;
        }
        match &self.probe {
            Some(probe) => probe.refresh(&self.network).await,
            None => self.network.is_online()
        }
    }

    /// Decide reachability, then replay what earlier runs left in `kind`'s queue
    ///
    /// Called before a new mutation so that it lands behind the backlog
    /// instead of overtaking it.
    pub async fn connect(&self, kind: QueueKind, force_offline: bool) -> bool {
        let online = self.detect_network(force_offline).await;
        self.refresh().await;
        if online {
            self.sync(kind).await;
        }
        online
    }

    /// Refresh the persisted counters of every queue
    pub async fn refresh(&self) {
        self.tasks.queue().refresh_pending().await;
        self.moods.queue().refresh_pending().await;
        self.journal.queue().refresh_pending().await;
    }

    pub fn status(&self, kind: QueueKind) -> QueueStatus {
        match kind {
            QueueKind::Tasks => self.tasks.queue().status(),
            QueueKind::Moods => self.moods.queue().status(),
            QueueKind::Journal => self.journal.queue().status()
        }
    }

    pub fn namespace(&self, kind: QueueKind) -> &str {
        match kind {
            QueueKind::Tasks => self.tasks.queue().namespace(),
            QueueKind::Moods => self.moods.queue().namespace(),
            QueueKind::Journal => self.journal.queue().namespace()
        }
    }

    pub fn storage_available(&self) -> bool {
        self.tasks.queue().is_available()
    }

    pub fn storage_location(&self) -> Option<PathBuf> {
        match self.settings.storage.backend {
            QueueStorageType::InMemory => None,
            QueueStorageType::RocksDb => self.settings.storage_path().ok()
        }
    }

    pub async fn sync(&self, kind: QueueKind) -> SyncOutcome {
        match kind {
            QueueKind::Tasks => self.tasks.sync_queue().await,
            QueueKind::Moods => self.moods.sync_queue().await,
            QueueKind::Journal => self.journal.sync_queue().await
        }
    }

    pub async fn entries(&self, kind: QueueKind, dead: bool) -> Result<Vec<EntryView>, MehError> {
        match kind {
            QueueKind::Tasks => list_queue(self.tasks.queue(), dead).await,
            QueueKind::Moods => list_queue(self.moods.queue(), dead).await,
            QueueKind::Journal => list_queue(self.journal.queue(), dead).await
        }
    }

    /// Move dead letters back to the end of their queue
    pub async fn retry_dead_letters(&self, kind: QueueKind) -> Result<usize, MehError> {
        match kind {
            QueueKind::Tasks => self.tasks.queue().retry_dead_letters().await,
            QueueKind::Moods => self.moods.queue().retry_dead_letters().await,
            QueueKind::Journal => self.journal.queue().retry_dead_letters().await
        }
    }

    pub async fn purge_dead_letters(&self, kind: QueueKind) -> Result<usize, MehError> {
        match kind {
            QueueKind::Tasks => self.tasks.queue().purge_dead_letters().await,
            QueueKind::Moods => self.moods.queue().purge_dead_letters().await,
            QueueKind::Journal => self.journal.queue().purge_dead_letters().await
        }
    }

    /// Start the reconnect-driven sync loop of every queue
    pub fn start_auto_sync(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            self.tasks.queue().start_auto_sync(shutdown.clone()),
            self.moods.queue().start_auto_sync(shutdown.clone()),
            self.journal.queue().start_auto_sync(shutdown.clone())
        ]
    }

    /// Re-probe the backend until `shutdown` is cancelled
    ///
    /// Each transition to reachable wakes the auto-sync loops.
    pub fn start_probe(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let app = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        app.detect_network(false).await;
                    }
                }
            }
        })
    }
}
