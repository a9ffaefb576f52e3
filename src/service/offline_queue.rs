//! Durable offline mutation queue
//!
//! An [`OfflineQueue`] buffers mutations in one storage namespace and replays
//! them through a [`MutationProcessor`] once the network is reachable.
//!
//! # Invariants
//! - Replay order is insertion order. A failed replay stops the pass; the
//!   failed entry and everything after it stay queued untouched.
//! - An entry is deleted only after its replay succeeded. A replay whose
//!   write the server applied but whose answer could not be read counts as
//!   succeeded, so it is never sent twice.
//! - At most one sync pass runs at a time per queue (in-flight latch).
//! - Without storage every operation is a silent no-op and `pending` stays 0.
//!
//! An entry that keeps failing is moved to the `<namespace>.dead` namespace
//! once it has failed `max_attempts` times, or on the first 4xx rejection
//! (`max_attempts == 0` disables both), so a poisoned mutation stalls the
//! queue for a bounded number of passes only.

use std::{
    future::Future,
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering}
    },
    time::Duration
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::{
    sync::{OnceCell, watch},
    task::JoinHandle
};
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    domain::{
        constant::{DEAD_LETTER_SUFFIX, mutation as wrapper, offline_queue},
        error::MehError
    },
    port::{
        network::NetworkStatus,
        storage::{QueueStorage, StoredEntry}
    }
};

/// Replays one mutation against the remote API
#[async_trait]
pub trait MutationProcessor<M>: Send + Sync {
    async fn process(&self, mutation: &M) -> Result<(), MehError>;
}

/// Adapts an async closure into a [`MutationProcessor`]
pub struct ProcessFn<M, F> {
    f:         F,
    _mutation: PhantomData<fn(M)>
}

pub fn process_fn<M, F, Fut>(f: F) -> ProcessFn<M, F>
where
    F: Fn(M) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), MehError>> + Send
{
    ProcessFn { f, _mutation: PhantomData }
}

#[async_trait]
impl<M, F, Fut> MutationProcessor<M> for ProcessFn<M, F>
where
    M: Clone + Send + Sync,
    F: Fn(M) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), MehError>> + Send
{
    async fn process(&self, mutation: &M) -> Result<(), MehError> {
        (self.f)(mutation.clone()).await
    }
}

/// What is actually written to storage for each queued mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry<M> {
    pub mutation:    M,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts:    u32,
    #[serde(default)]
    pub last_error:  Option<String>
}

impl<M> QueueEntry<M> {
    pub fn new(mutation: M) -> Self {
        Self { mutation, enqueued_at: Utc::now(), attempts: 0, last_error: None }
    }
}

/// Replay behavior of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Failed attempts after which an entry is dead-lettered; 0 keeps it forever
    pub max_attempts:    u32,
    /// Upper bound for a single replay; `None` waits indefinitely
    pub process_timeout: Option<Duration>
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, process_timeout: Some(Duration::from_secs(30)) }
    }
}

/// Observable state of a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending:      usize,
    pub syncing:      bool,
    pub dead_letters: usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    InFlight,
    StorageUnavailable
}

/// Result of one sync pass that actually ran
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub replayed:      usize,
    pub dead_lettered: usize,
    /// Entries left in the queue after the pass
    pub remaining:     usize,
    /// The failure that stopped the pass, if any
    pub error:         Option<MehError>
}

impl SyncReport {
    pub fn stalled(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport)
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None
        }
    }
}

/// Releases the in-flight latch and the syncing flag, even on panic
struct SyncGuard<'a> {
    in_flight: &'a AtomicBool,
    status:    &'a watch::Sender<QueueStatus>
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.status.send_modify(|status| status.syncing = false);
        self.in_flight.store(false, Ordering::Release);
    }
}

/// A named, durable FIFO of mutations of type `M`
pub struct OfflineQueue<M> {
    namespace:   String,
    dead_letter: String,
    storage:     Option<Arc<dyn QueueStorage>>,
    network:     Arc<dyn NetworkStatus>,
    processor:   Arc<dyn MutationProcessor<M>>,
    policy:      SyncPolicy,
    ready:       OnceCell<()>,
    in_flight:   AtomicBool,
    status:      watch::Sender<QueueStatus>
}

impl<M> OfflineQueue<M>
where
    M: Serialize + DeserializeOwned + Send + Sync + 'static
{
    pub fn new(
        namespace: impl Into<String>,
        storage: Option<Arc<dyn QueueStorage>>,
        network: Arc<dyn NetworkStatus>,
        processor: Arc<dyn MutationProcessor<M>>
    ) -> Self {
        let namespace = namespace.into();
        let (status, _) = watch::channel(QueueStatus::default());

        if storage.is_none() {
            event!(Level::DEBUG, event = offline_queue::STORAGE_UNAVAILABLE, namespace = %namespace);
        }

        Self {
            dead_letter: format!("{}{}", namespace, DEAD_LETTER_SUFFIX),
            namespace,
            storage,
            network,
            processor,
            policy: SyncPolicy::default(),
            ready: OnceCell::new(),
            in_flight: AtomicBool::new(false),
            status
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_available(&self) -> bool {
        self.storage.is_some()
    }

    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    pub fn status(&self) -> QueueStatus {
        *self.status.borrow()
    }

    pub fn pending(&self) -> usize {
        self.status().pending
    }

    pub fn is_syncing(&self) -> bool {
        self.status().syncing
    }

    /// Receiver notified on every pending/syncing change
    pub fn subscribe_status(&self) -> watch::Receiver<QueueStatus> {
        self.status.subscribe()
    }

    /// Create the namespace on first use
    async fn storage_ready(&self) -> Result<Option<&Arc<dyn QueueStorage>>, MehError> {
        let Some(storage) = &self.storage else {
            return Ok(None);
        };
        self.ready
            .get_or_try_init(|| async {
                storage.ensure_namespace(&self.namespace).await?;
                storage.ensure_namespace(&self.dead_letter).await
            })
            .await?;
        Ok(Some(storage))
    }

    /// Durably append a mutation to the end of the queue
    pub async fn enqueue(&self, mutation: M) -> Result<(), MehError> {
        let Some(storage) = self.storage_ready().await? else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(&QueueEntry::new(mutation))?;
        let key = storage.append(&self.namespace, &bytes).await?;

        event!(Level::DEBUG, event = offline_queue::MUTATION_ENQUEUED, namespace = %self.namespace, key);

        self.refresh_pending().await;
        Ok(())
    }

    /// Recount pending and dead-lettered entries from storage
    pub async fn refresh_pending(&self) {
        let Some(storage) = &self.storage else {
            return;
        };

        let counts = async {
            let pending = storage.count(&self.namespace).await?;
            let dead_letters = storage.count(&self.dead_letter).await?;
            Ok::<_, MehError>((pending, dead_letters))
        };

        match counts.await {
            Ok((pending, dead_letters)) => self.status.send_modify(|status| {
                status.pending = pending;
                status.dead_letters = dead_letters;
            }),
            Err(e) => {
                event!(Level::WARN, event = offline_queue::PENDING_REFRESH_FAILED,
                       namespace = %self.namespace, error = %e)
            }
        }
    }

    /// Try the direct remote call when online, queue the mutation otherwise
    ///
    /// Returns the server's answer when the direct call succeeded and `None`
    /// when the mutation was queued (accepted but not yet confirmed). While
    /// older mutations are still pending the new one is queued behind them,
    /// so it can never overtake them. Never fails; a mutation that could not
    /// even be queued is logged.
    pub async fn submit<T, F, Fut>(&self, mutation: M, direct: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MehError>>
    {
        if !self.network.is_online() {
            event!(Level::DEBUG, event = wrapper::QUEUED_OFFLINE, namespace = %self.namespace);
        } else if self.pending() > 0 {
            event!(Level::DEBUG, event = wrapper::QUEUED_BEHIND_BACKLOG,
                   namespace = %self.namespace, pending = self.pending());
        } else {
            match direct().await {
                Ok(value) => {
                    event!(Level::DEBUG, event = wrapper::DIRECT_CALL_SUCCEEDED, namespace = %self.namespace);
                    return Some(value);
                }
                Err(e) if e.is_committed() => {
                    // Applied remotely; queueing it would apply it twice
                    event!(Level::WARN, event = wrapper::DIRECT_CALL_UNCONFIRMED,
                           namespace = %self.namespace, error = %e);
                    return None;
                }
                Err(e) => {
                    event!(Level::WARN, event = wrapper::DIRECT_CALL_FAILED, namespace = %self.namespace, error = %e);
                }
            }
        }

        if let Err(e) = self.enqueue(mutation).await {
            event!(Level::ERROR, event = offline_queue::ENQUEUE_FAILED, namespace = %self.namespace, error = %e);
        }
        None
    }

    /// Replay queued mutations oldest-first until the queue is empty or one fails
    pub async fn sync_queue(&self) -> SyncOutcome {
        let Some(storage) = self.storage.clone() else {
            return SyncOutcome::Skipped(SkipReason::StorageUnavailable);
        };

        if !self.network.is_online() {
            event!(Level::DEBUG, event = offline_queue::SYNC_SKIPPED, namespace = %self.namespace, reason = "offline");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        if self.in_flight.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            event!(Level::DEBUG, event = offline_queue::SYNC_SKIPPED,
                   namespace = %self.namespace, reason = "in_flight");
            return SyncOutcome::Skipped(SkipReason::InFlight);
        }

        let _guard = SyncGuard { in_flight: &self.in_flight, status: &self.status };
        self.status.send_modify(|status| status.syncing = true);

        event!(Level::DEBUG, event = offline_queue::SYNC_STARTED, namespace = %self.namespace);

        let mut report = match self.storage_ready().await {
            Ok(_) => self.drain(storage.as_ref()).await,
            Err(e) => SyncReport { error: Some(e), ..SyncReport::default() }
        };

        self.refresh_pending().await;
        report.remaining = self.pending();

        match &report.error {
            None => event!(Level::INFO, event = offline_queue::SYNC_COMPLETED, namespace = %self.namespace,
                           replayed = report.replayed, dead_lettered = report.dead_lettered),
            Some(e) => event!(Level::WARN, event = offline_queue::SYNC_STALLED, namespace = %self.namespace,
                              replayed = report.replayed, remaining = report.remaining, error = %e)
        }

        SyncOutcome::Completed(report)
    }

    async fn drain(&self, storage: &dyn QueueStorage) -> SyncReport {
        let mut report = SyncReport::default();

        // Snapshot first: no storage iteration stays open across network calls
        let entries = match storage.scan(&self.namespace).await {
            Ok(entries) => entries,
            Err(e) => {
                event!(Level::ERROR, event = offline_queue::SYNC_READ_FAILED, namespace = %self.namespace, error = %e);
                report.error = Some(e);
                return report;
            }
        };

        for stored in entries {
            let mut entry: QueueEntry<M> = match serde_json::from_slice(&stored.value) {
                Ok(entry) => entry,
                Err(e) => {
                    // Can never be replayed; park it and keep going
                    event!(Level::ERROR, event = offline_queue::MUTATION_DEAD_LETTERED,
                           namespace = %self.namespace, key = stored.key, error = %e);
                    if let Err(e) = self.move_to_dead_letter(storage, stored.key, &stored.value).await {
                        report.error = Some(e);
                        break;
                    }
                    report.dead_lettered += 1;
                    continue;
                }
            };

            match self.replay(&entry.mutation).await {
                Err(error) if error.is_committed() => {
                    event!(Level::WARN, event = offline_queue::REPLAY_UNCONFIRMED,
                           namespace = %self.namespace, key = stored.key, error = %error);
                    if let Err(e) = storage.delete(&self.namespace, stored.key).await {
                        report.error = Some(e);
                        break;
                    }
                    report.replayed += 1;
                }
                Ok(()) => {
                    if let Err(e) = storage.delete(&self.namespace, stored.key).await {
                        report.error = Some(e);
                        break;
                    }
                    report.replayed += 1;
                    event!(Level::DEBUG, event = offline_queue::MUTATION_REPLAYED,
                           namespace = %self.namespace, key = stored.key);
                }
                Err(error) => {
                    entry.attempts += 1;
                    entry.last_error = Some(error.to_string());
                    let give_up = self.exhausted(&entry, &error);

                    if let Err(e) = self.record_failure(storage, &stored, &entry, give_up).await {
                        event!(Level::WARN, event = offline_queue::ATTEMPT_RECORD_FAILED, namespace = %self.namespace,
                               key = stored.key, error = %e);
                    } else if give_up {
                        report.dead_lettered += 1;
                    }

                    report.error = Some(error);
                    break;
                }
            }
        }

        report
    }

    /// A 4xx rejection will not succeed on retry, so it is parked at once
    fn exhausted(&self, entry: &QueueEntry<M>, error: &MehError) -> bool {
        self.policy.max_attempts > 0 && (entry.attempts >= self.policy.max_attempts || error.is_rejection())
    }

    /// Persist the bumped attempt counter, or park the entry when giving up
    async fn record_failure(
        &self,
        storage: &dyn QueueStorage,
        stored: &StoredEntry,
        entry: &QueueEntry<M>,
        give_up: bool
    ) -> Result<(), MehError> {
        let bytes = serde_json::to_vec(entry)?;

        if give_up {
            event!(Level::ERROR, event = offline_queue::MUTATION_DEAD_LETTERED, namespace = %self.namespace,
                   key = stored.key, attempts = entry.attempts);
            self.move_to_dead_letter(storage, stored.key, &bytes).await
        } else {
            storage.replace(&self.namespace, stored.key, &bytes).await
        }
    }

    async fn move_to_dead_letter(&self, storage: &dyn QueueStorage, key: u64, bytes: &[u8]) -> Result<(), MehError> {
        storage.move_entry(&self.namespace, key, &self.dead_letter, bytes).await.map(|_| ())
    }

    async fn replay(&self, mutation: &M) -> Result<(), MehError> {
        match self.policy.process_timeout {
            Some(limit) => tokio::time::timeout(limit, self.processor.process(mutation))
                .await
                .map_err(|_| MehError::Timeout(format!("Replay did not finish within {:?}", limit)))?,
            None => self.processor.process(mutation).await
        }
    }

    async fn read_namespace(&self, namespace: &str) -> Result<Vec<(u64, QueueEntry<M>)>, MehError> {
        let Some(storage) = &self.storage else {
            return Ok(vec![]);
        };

        let entries = storage.scan(namespace).await?;
        Ok(entries
            .into_iter()
            .filter_map(|stored| match serde_json::from_slice(&stored.value) {
                Ok(entry) => Some((stored.key, entry)),
                Err(_) => None
            })
            .collect())
    }

    /// Queued entries in replay order (undecodable entries are left out)
    pub async fn entries(&self) -> Result<Vec<(u64, QueueEntry<M>)>, MehError> {
        self.read_namespace(&self.namespace).await
    }

    /// Dead-lettered entries, oldest first
    pub async fn dead_letters(&self) -> Result<Vec<(u64, QueueEntry<M>)>, MehError> {
        self.read_namespace(&self.dead_letter).await
    }

    /// Move every decodable dead letter back to the tail of the queue with a
    /// fresh attempt counter. Returns how many were requeued.
    pub async fn retry_dead_letters(&self) -> Result<usize, MehError> {
        let Some(storage) = self.storage_ready().await? else {
            return Ok(0);
        };

        let mut requeued = 0;
        for (key, mut entry) in self.dead_letters().await? {
            entry.attempts = 0;
            entry.last_error = None;
            storage.move_entry(&self.dead_letter, key, &self.namespace, &serde_json::to_vec(&entry)?).await?;
            requeued += 1;
        }

        self.refresh_pending().await;
        Ok(requeued)
    }

    /// Drop every dead letter, decodable or not. Returns how many were removed.
    pub async fn purge_dead_letters(&self) -> Result<usize, MehError> {
        let Some(storage) = self.storage_ready().await? else {
            return Ok(0);
        };

        let entries = storage.scan(&self.dead_letter).await?;
        for stored in &entries {
            storage.delete(&self.dead_letter, stored.key).await?;
        }

        self.refresh_pending().await;
        Ok(entries.len())
    }

    /// Sync once now if reachable, then again on every "became reachable"
    /// signal, until `shutdown` is cancelled.
    pub fn start_auto_sync(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let queue = self.clone();
        let mut online = queue.network.watch();

        tokio::spawn(async move {
            event!(Level::DEBUG, event = offline_queue::AUTO_SYNC_STARTED, namespace = %queue.namespace);

            queue.refresh_pending().await;
            if queue.network.is_online() {
                queue.sync_queue().await;
            }

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *online.borrow_and_update() {
                            queue.sync_queue().await;
                        }
                    }
                }
            }

            event!(Level::DEBUG, event = offline_queue::AUTO_SYNC_STOPPED, namespace = %queue.namespace);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;
    use crate::adapter::{network::NetworkMonitor, storage::InMemoryQueueStorage};

    /// Records every replay; fails for mutations listed in `failing`
    #[derive(Default)]
    struct ScriptedProcessor {
        calls:   Mutex<Vec<String>>,
        failing: Mutex<Vec<String>>
    }

    impl ScriptedProcessor {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn fail(&self, mutation: &str) {
            self.failing.lock().unwrap().push(mutation.to_string());
        }

        fn heal(&self) {
            self.failing.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl MutationProcessor<String> for ScriptedProcessor {
        async fn process(&self, mutation: &String) -> Result<(), MehError> {
            self.calls.lock().unwrap().push(mutation.clone());
            if self.failing.lock().unwrap().contains(mutation) {
                return Err(MehError::Network(format!("cannot replay {}", mutation)));
            }
            Ok(())
        }
    }

    struct Fixture {
        queue:     Arc<OfflineQueue<String>>,
        network:   Arc<NetworkMonitor>,
        processor: Arc<ScriptedProcessor>,
        storage:   Arc<InMemoryQueueStorage>
    }

    fn fixture(online: bool, policy: SyncPolicy) -> Fixture {
        let network = Arc::new(NetworkMonitor::new(online));
        let processor = Arc::new(ScriptedProcessor::default());
        let storage = Arc::new(InMemoryQueueStorage::new());
        let queue = Arc::new(
            OfflineQueue::new(
                "test",
                Some(storage.clone() as Arc<dyn QueueStorage>),
                network.clone(),
                processor.clone()
            )
            .with_policy(policy)
        );
        Fixture { queue, network, processor, storage }
    }

    fn items(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("m{}", i)).collect()
    }

    #[tokio::test]
    async fn test_offline_enqueue_then_replay_in_order() {
        let fx = fixture(false, SyncPolicy::default());

        for item in items(5) {
            fx.queue.enqueue(item).await.unwrap();
        }
        assert_eq!(fx.queue.pending(), 5);

        assert!(matches!(fx.queue.sync_queue().await, SyncOutcome::Skipped(SkipReason::Offline)));
        assert!(fx.processor.calls().is_empty());

        fx.network.set_online(true);
        let outcome = fx.queue.sync_queue().await;
        let report = outcome.report().unwrap();

        assert_eq!(report.replayed, 5);
        assert_eq!(report.remaining, 0);
        assert!(!report.stalled());
        assert_eq!(fx.processor.calls(), items(5));
        assert_eq!(fx.queue.pending(), 0);
        assert!(!fx.queue.is_syncing());
    }

    #[tokio::test]
    async fn test_failure_is_an_ordering_barrier() {
        let fx = fixture(true, SyncPolicy::default());
        let n = 5;
        let k = 3;

        for item in items(n) {
            fx.queue.enqueue(item).await.unwrap();
        }
        fx.processor.fail("m3");

        let outcome = fx.queue.sync_queue().await;
        let report = outcome.report().unwrap();

        assert!(report.stalled());
        assert_eq!(report.replayed, k - 1);
        assert_eq!(fx.queue.pending(), n - (k - 1));
        assert_eq!(fx.processor.calls(), vec!["m1", "m2", "m3"]);

        // The next pass resumes at the failed item, not at the start
        fx.processor.heal();
        fx.queue.sync_queue().await;

        assert_eq!(fx.processor.calls(), vec!["m1", "m2", "m3", "m3", "m4", "m5"]);
        assert_eq!(fx.queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_attempts_are_recorded() {
        let fx = fixture(true, SyncPolicy::default());
        fx.queue.enqueue("m1".to_string()).await.unwrap();
        fx.processor.fail("m1");

        fx.queue.sync_queue().await;
        fx.queue.sync_queue().await;

        let entries = fx.queue.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.attempts, 2);
        assert_eq!(entries[0].1.last_error.as_deref(), Some("cannot replay m1"));
    }

    #[tokio::test]
    async fn test_poisoned_entry_is_dead_lettered_after_max_attempts() {
        let fx = fixture(true, SyncPolicy { max_attempts: 2, process_timeout: None });
        fx.queue.enqueue("bad".to_string()).await.unwrap();
        fx.queue.enqueue("good".to_string()).await.unwrap();
        fx.processor.fail("bad");

        let first = fx.queue.sync_queue().await;
        assert_eq!(first.report().unwrap().dead_lettered, 0);
        assert_eq!(fx.queue.pending(), 2);

        let second = fx.queue.sync_queue().await;
        assert_eq!(second.report().unwrap().dead_lettered, 1);
        assert_eq!(fx.queue.status(), QueueStatus { pending: 1, syncing: false, dead_letters: 1 });

        fx.queue.sync_queue().await;
        assert_eq!(fx.processor.calls(), vec!["bad", "bad", "good"]);
        assert_eq!(fx.queue.pending(), 0);

        let dead = fx.queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].1.mutation, "bad");
        assert_eq!(dead[0].1.attempts, 2);

        fx.processor.heal();
        assert_eq!(fx.queue.retry_dead_letters().await.unwrap(), 1);
        assert_eq!(fx.queue.status(), QueueStatus { pending: 1, syncing: false, dead_letters: 0 });

        fx.queue.sync_queue().await;
        assert_eq!(fx.queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_zero_max_attempts_blocks_forever() {
        let fx = fixture(true, SyncPolicy { max_attempts: 0, process_timeout: None });
        fx.queue.enqueue("bad".to_string()).await.unwrap();
        fx.queue.enqueue("good".to_string()).await.unwrap();
        fx.processor.fail("bad");

        for _ in 0..10 {
            fx.queue.sync_queue().await;
        }

        assert_eq!(fx.queue.pending(), 2);
        assert_eq!(fx.queue.status().dead_letters, 0);
        assert!(!fx.processor.calls().contains(&"good".to_string()));
    }

    #[tokio::test]
    async fn test_rejected_mutation_is_parked_immediately() {
        let network = Arc::new(NetworkMonitor::new(true));
        let processor = Arc::new(process_fn(|mutation: String| async move {
            if mutation == "invalid" {
                return Err(MehError::Remote { status: 422, message: "title is required".to_string() });
            }
            Ok(())
        }));
        let queue = OfflineQueue::new(
            "test",
            Some(Arc::new(InMemoryQueueStorage::new()) as Arc<dyn QueueStorage>),
            network,
            processor
        );
        queue.enqueue("invalid".to_string()).await.unwrap();
        queue.enqueue("valid".to_string()).await.unwrap();

        let first = queue.sync_queue().await;
        assert_eq!(first.report().unwrap().dead_lettered, 1);
        assert!(first.report().unwrap().stalled());

        let second = queue.sync_queue().await;
        assert_eq!(second.report().unwrap().replayed, 1);
        assert_eq!(queue.status(), QueueStatus { pending: 0, syncing: false, dead_letters: 1 });
    }

    #[tokio::test]
    async fn test_applied_but_unreadable_replay_is_not_sent_again() {
        let network = Arc::new(NetworkMonitor::new(true));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let processor = {
            let sent = sent.clone();
            Arc::new(process_fn(move |mutation: String| {
                let sent = sent.clone();
                async move {
                    sent.lock().unwrap().push(mutation);
                    Err::<(), _>(MehError::UnreadableResponse("Failed to decode response body".to_string()))
                }
            }))
        };
        let queue = OfflineQueue::new(
            "test",
            Some(Arc::new(InMemoryQueueStorage::new()) as Arc<dyn QueueStorage>),
            network,
            processor
        );
        queue.enqueue("m1".to_string()).await.unwrap();
        queue.enqueue("m2".to_string()).await.unwrap();

        let first = queue.sync_queue().await;
        assert_eq!(first.report().unwrap().replayed, 2);
        assert!(!first.report().unwrap().stalled());

        queue.sync_queue().await;
        assert_eq!(*sent.lock().unwrap(), vec!["m1", "m2"]);
        assert_eq!(queue.status(), QueueStatus::default());
    }

    #[tokio::test]
    async fn test_submit_queues_behind_pending_entries() {
        let fx = fixture(true, SyncPolicy::default());
        fx.queue.enqueue("older".to_string()).await.unwrap();

        let called = AtomicBool::new(false);
        let answer = fx
            .queue
            .submit("newer".to_string(), || async {
                called.store(true, Ordering::SeqCst);
                Ok::<_, MehError>(())
            })
            .await;

        assert!(answer.is_none());
        assert!(!called.load(Ordering::SeqCst));
        let queued: Vec<String> = fx.queue.entries().await.unwrap().into_iter().map(|(_, e)| e.mutation).collect();
        assert_eq!(queued, vec!["older", "newer"]);

        fx.queue.sync_queue().await;
        assert_eq!(fx.processor.calls(), vec!["older", "newer"]);
    }

    #[tokio::test]
    async fn test_unconfirmed_direct_call_is_not_queued() {
        let fx = fixture(true, SyncPolicy::default());

        let answer = fx
            .queue
            .submit("m1".to_string(), || async {
                Err::<(), _>(MehError::UnreadableResponse("Failed to decode response body".to_string()))
            })
            .await;

        assert!(answer.is_none());
        assert_eq!(fx.queue.pending(), 0);

        let failed = fx
            .queue
            .submit("m2".to_string(), || async { Err::<(), _>(MehError::Network("connection reset".to_string())) })
            .await;

        assert!(failed.is_none());
        assert_eq!(fx.queue.pending(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_entries_are_parked() {
        let fx = fixture(true, SyncPolicy::default());
        fx.storage.append("test", b"not json").await.unwrap();
        fx.queue.enqueue("m1".to_string()).await.unwrap();

        let outcome = fx.queue.sync_queue().await;
        let report = outcome.report().unwrap();

        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.replayed, 1);
        assert_eq!(fx.processor.calls(), vec!["m1"]);
        assert_eq!(fx.queue.status().dead_letters, 1);

        assert_eq!(fx.queue.purge_dead_letters().await.unwrap(), 1);
        assert_eq!(fx.queue.status().dead_letters, 0);
    }

    #[tokio::test]
    async fn test_missing_storage_degrades_to_noop() {
        let network = Arc::new(NetworkMonitor::new(true));
        let processor = Arc::new(ScriptedProcessor::default());
        let queue = OfflineQueue::<String>::new("test", None, network, processor.clone());

        assert!(!queue.is_available());
        queue.enqueue("m1".to_string()).await.unwrap();

        assert_eq!(queue.pending(), 0);
        assert!(matches!(queue.sync_queue().await, SyncOutcome::Skipped(SkipReason::StorageUnavailable)));
        assert!(queue.entries().await.unwrap().is_empty());
        assert!(processor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_sync_is_rejected() {
        let network = Arc::new(NetworkMonitor::new(true));
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let processor = {
            let started = started.clone();
            let release = release.clone();
            Arc::new(process_fn(move |_: String| {
                let started = started.clone();
                let release = release.clone();
                async move {
                    started.notify_one();
                    release.notified().await;
                    Ok(())
                }
            }))
        };

        let queue = Arc::new(OfflineQueue::new(
            "test",
            Some(Arc::new(InMemoryQueueStorage::new()) as Arc<dyn QueueStorage>),
            network,
            processor
        ));
        queue.enqueue("m1".to_string()).await.unwrap();

        let first = tokio::spawn({
            let queue = queue.clone();
            async move { queue.sync_queue().await }
        });

        started.notified().await;
        assert!(queue.is_syncing());
        assert!(matches!(queue.sync_queue().await, SyncOutcome::Skipped(SkipReason::InFlight)));

        release.notify_one();
        let outcome = first.await.unwrap();

        assert_eq!(outcome.report().unwrap().replayed, 1);
        assert!(!queue.is_syncing());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_hung_replay_times_out() {
        let network = Arc::new(NetworkMonitor::new(true));
        let processor = Arc::new(process_fn(|_: String| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }));
        let queue = OfflineQueue::new(
            "test",
            Some(Arc::new(InMemoryQueueStorage::new()) as Arc<dyn QueueStorage>),
            network,
            processor
        )
        .with_policy(SyncPolicy { max_attempts: 0, process_timeout: Some(Duration::from_millis(20)) });

        queue.enqueue("m1".to_string()).await.unwrap();
        let outcome = queue.sync_queue().await;

        assert!(matches!(outcome.report().unwrap().error, Some(MehError::Timeout(_))));
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test]
    async fn test_auto_sync_drains_on_reconnect() {
        let fx = fixture(false, SyncPolicy::default());
        let shutdown = CancellationToken::new();
        let worker = fx.queue.start_auto_sync(shutdown.clone());

        for item in items(3) {
            fx.queue.enqueue(item).await.unwrap();
        }
        let mut status = fx.queue.subscribe_status();

        fx.network.set_online(true);
        tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.pending == 0 && !s.syncing))
            .await
            .expect("queue was not drained after reconnect")
            .unwrap();

        assert_eq!(fx.processor.calls(), items(3));

        shutdown.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_auto_sync_drains_at_start_when_online() {
        let fx = fixture(true, SyncPolicy::default());
        let left_over = serde_json::to_vec(&QueueEntry::new("left-over".to_string())).unwrap();
        fx.storage.append("test", &left_over).await.unwrap();

        let shutdown = CancellationToken::new();
        let mut status = fx.queue.subscribe_status();
        let worker = fx.queue.start_auto_sync(shutdown.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if fx.processor.calls() == vec!["left-over".to_string()] && fx.queue.pending() == 0 {
                    break;
                }
                status.changed().await.unwrap();
            }
        })
        .await
        .expect("left-over entry was not replayed at start");

        shutdown.cancel();
        worker.await.unwrap();
    }
}
