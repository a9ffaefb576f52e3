//! Queue storage implementations
//!
//! This module provides both in-memory and persistent (RocksDB) implementations
//! of the [`QueueStorage`] port.

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::{Arc, Mutex}
};

use async_trait::async_trait;
use rocksdb::{ColumnFamily, DB, Direction, IteratorMode, Options, WriteBatch};
use tokio::sync::RwLock;
use tracing::{Level, event};

use crate::{
    domain::{
        constant::{STORAGE_SCHEMA_VERSION, offline_queue},
        error::MehError
    },
    port::storage::{QueueStorage, StoredEntry}
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
pub enum QueueStorageType {
    #[serde(rename = "inmemory")]
    #[value(name = "inmemory")]
    InMemory,
    #[serde(rename = "rocksdb")]
    #[value(name = "rocksdb")]
    RocksDb
}

impl QueueStorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStorageType::InMemory => "inmemory",
            QueueStorageType::RocksDb => "rocksdb"
        }
    }
}

#[derive(Debug, Default)]
struct Namespace {
    last_key: u64,
    entries:  BTreeMap<u64, Vec<u8>>
}

/// In-memory queue storage
///
/// Suitable for tests and for environments without a writable data
/// directory; everything is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryQueueStorage {
    namespaces: Arc<RwLock<HashMap<String, Namespace>>>
}

impl InMemoryQueueStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStorage for InMemoryQueueStorage {
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), MehError> {
        let mut namespaces = self.namespaces.write().await;
        namespaces.entry(namespace.to_string()).or_default();
        Ok(())
    }

    async fn append(&self, namespace: &str, value: &[u8]) -> Result<u64, MehError> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces.entry(namespace.to_string()).or_default();

        ns.last_key += 1;
        ns.entries.insert(ns.last_key, value.to_vec());

        Ok(ns.last_key)
    }

    async fn count(&self, namespace: &str) -> Result<usize, MehError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).map(|ns| ns.entries.len()).unwrap_or(0))
    }

    async fn scan(&self, namespace: &str) -> Result<Vec<StoredEntry>, MehError> {
        let namespaces = self.namespaces.read().await;

        if let Some(ns) = namespaces.get(namespace) {
            Ok(ns.entries.iter().map(|(key, value)| StoredEntry { key: *key, value: value.clone() }).collect())
        } else {
            Ok(vec![])
        }
    }

    async fn replace(&self, namespace: &str, key: u64, value: &[u8]) -> Result<(), MehError> {
        let mut namespaces = self.namespaces.write().await;

        match namespaces.get_mut(namespace).and_then(|ns| ns.entries.get_mut(&key)) {
            Some(slot) => {
                *slot = value.to_vec();
                Ok(())
            }
            None => Err(MehError::Storage(format!("No entry {} in namespace '{}'", key, namespace)))
        }
    }

    async fn delete(&self, namespace: &str, key: u64) -> Result<(), MehError> {
        let mut namespaces = self.namespaces.write().await;

        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.entries.remove(&key);
        }

        Ok(())
    }

    async fn move_entry(&self, from: &str, key: u64, to: &str, value: &[u8]) -> Result<u64, MehError> {
        let mut namespaces = self.namespaces.write().await;

        let target = namespaces.entry(to.to_string()).or_default();
        target.last_key += 1;
        let moved = target.last_key;
        target.entries.insert(moved, value.to_vec());

        if let Some(ns) = namespaces.get_mut(from) {
            ns.entries.remove(&key);
        }

        Ok(moved)
    }
}

/// Column family names
const CF_QUEUE: &str = "queue";
const CF_META: &str = "meta";

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// RocksDB-based queue storage
///
/// Storage layout:
/// - `queue` CF: `{namespace}:{key:020}` -> serialized entry
/// - `meta` CF: `seq:{namespace}` -> u64 (last handed out key, big endian)
/// - `meta` CF: `namespace:{namespace}` -> empty marker
/// - `meta` CF: `schema_version` -> u32 (big endian)
///
/// Keys are zero padded so the lexicographic iteration order of RocksDB is
/// the insertion order.
pub struct RocksDbQueueStorage {
    db:          Arc<DB>,
    /// Serializes the read-increment-write of sequence counters
    append_lock: Arc<Mutex<()>>
}

impl RocksDbQueueStorage {
    /// Open (or create) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MehError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open_cf(&opts, path, [CF_QUEUE, CF_META])
            .map_err(|e| MehError::Storage(format!("Failed to open RocksDB: {}", e)))?;

        let storage = Self { db: Arc::new(db), append_lock: Arc::new(Mutex::new(())) };
        storage.check_schema_version()?;

        Ok(storage)
    }

    fn check_schema_version(&self) -> Result<(), MehError> {
        let meta = get_cf(&self.db, CF_META)?;

        match self.db.get_cf(meta, SCHEMA_VERSION_KEY)? {
            Some(data) => {
                let bytes: [u8; 4] = data
                    .try_into()
                    .map_err(|_| MehError::Storage("Invalid schema version data".to_string()))?;
                let found = u32::from_be_bytes(bytes);
                if found != STORAGE_SCHEMA_VERSION {
                    return Err(MehError::Storage(format!(
                        "Unsupported queue storage schema version {} (expected {})",
                        found, STORAGE_SCHEMA_VERSION
                    )));
                }
                Ok(())
            }
            None => {
                self.db.put_cf(meta, SCHEMA_VERSION_KEY, STORAGE_SCHEMA_VERSION.to_be_bytes())?;
                Ok(())
            }
        }
    }

    fn entry_key(namespace: &str, key: u64) -> String {
        format!("{}:{:020}", namespace, key)
    }

    fn seq_key(namespace: &str) -> String {
        format!("seq:{}", namespace)
    }

    fn namespace_key(namespace: &str) -> String {
        format!("namespace:{}", namespace)
    }

    /// Stage an append into `batch` and return the key it will get
    ///
    /// Callers must hold `append_lock` until the batch is written.
    fn batch_append(db: &DB, batch: &mut WriteBatch, namespace: &str, value: &[u8]) -> Result<u64, MehError> {
        let queue = get_cf(db, CF_QUEUE)?;
        let meta = get_cf(db, CF_META)?;
        let seq_key = Self::seq_key(namespace);

        let last = match db.get_cf(meta, &seq_key)? {
            Some(data) => {
                let bytes: [u8; 8] =
                    data.try_into().map_err(|_| MehError::Storage("Invalid sequence data".to_string()))?;
                u64::from_be_bytes(bytes)
            }
            None => 0
        };
        let key = last + 1;

        batch.put_cf(queue, Self::entry_key(namespace, key), value);
        batch.put_cf(meta, &seq_key, key.to_be_bytes());
        batch.put_cf(meta, Self::namespace_key(namespace), b"");
        Ok(key)
    }

    /// Run a closure against the DB on the blocking pool
    async fn blocking<F, R>(&self, f: F) -> Result<R, MehError>
    where
        F: FnOnce(&DB) -> Result<R, MehError> + Send + 'static,
        R: Send + 'static
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| MehError::Generic(format!("Storage task failed: {}", e)))?
    }
}

fn get_cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily, MehError> {
    db.cf_handle(name).ok_or_else(|| MehError::Storage(format!("Column family '{}' not found", name)))
}

/// Iterate over the `(key, value)` pairs of one namespace in key order
fn for_each_entry<F>(db: &DB, namespace: &str, mut f: F) -> Result<(), MehError>
where
    F: FnMut(u64, &[u8])
{
    let cf = get_cf(db, CF_QUEUE)?;
    let prefix = format!("{}:", namespace);

    let iter = db.iterator_cf(cf, IteratorMode::From(prefix.as_bytes(), Direction::Forward));
    for item in iter {
        let (key, value) = item.map_err(|e| MehError::Storage(format!("Failed to iterate queue: {}", e)))?;

        let Some(suffix) = key.strip_prefix(prefix.as_bytes()) else {
            break;
        };

        let entry_key = std::str::from_utf8(suffix)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| MehError::Storage(format!("Malformed queue key in namespace '{}'", namespace)))?;

        f(entry_key, &value);
    }

    Ok(())
}

#[async_trait]
impl QueueStorage for RocksDbQueueStorage {
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), MehError> {
        let marker = Self::namespace_key(namespace);

        self.blocking(move |db| {
            let meta = get_cf(db, CF_META)?;
            if db.get_cf(meta, &marker)?.is_none() {
                db.put_cf(meta, &marker, b"")?;
            }
            Ok(())
        })
        .await
    }

    async fn append(&self, namespace: &str, value: &[u8]) -> Result<u64, MehError> {
        let namespace = namespace.to_string();
        let value = value.to_vec();
        let lock = self.append_lock.clone();

        self.blocking(move |db| {
            let _guard = lock.lock().map_err(|_| MehError::Storage("Queue append lock poisoned".to_string()))?;

            let mut batch = WriteBatch::default();
            let key = Self::batch_append(db, &mut batch, &namespace, &value)?;
            db.write(batch).map_err(|e| MehError::Storage(format!("Failed to append to queue: {}", e)))?;

            Ok(key)
        })
        .await
    }

    async fn count(&self, namespace: &str) -> Result<usize, MehError> {
        let namespace = namespace.to_string();

        self.blocking(move |db| {
            let mut count = 0;
            for_each_entry(db, &namespace, |_, _| count += 1)?;
            Ok(count)
        })
        .await
    }

    async fn scan(&self, namespace: &str) -> Result<Vec<StoredEntry>, MehError> {
        let namespace = namespace.to_string();

        self.blocking(move |db| {
            let mut entries = Vec::new();
            for_each_entry(db, &namespace, |key, value| entries.push(StoredEntry { key, value: value.to_vec() }))?;
            Ok(entries)
        })
        .await
    }

    async fn replace(&self, namespace: &str, key: u64, value: &[u8]) -> Result<(), MehError> {
        let entry_key = Self::entry_key(namespace, key);
        let namespace = namespace.to_string();
        let value = value.to_vec();

        self.blocking(move |db| {
            let queue = get_cf(db, CF_QUEUE)?;
            if db.get_cf(queue, &entry_key)?.is_none() {
                return Err(MehError::Storage(format!("No entry {} in namespace '{}'", key, namespace)));
            }
            db.put_cf(queue, &entry_key, &value)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: u64) -> Result<(), MehError> {
        let entry_key = Self::entry_key(namespace, key);

        self.blocking(move |db| {
            let queue = get_cf(db, CF_QUEUE)?;
            db.delete_cf(queue, &entry_key)
                .map_err(|e| MehError::Storage(format!("Failed to delete queue entry: {}", e)))
        })
        .await
    }

    async fn move_entry(&self, from: &str, key: u64, to: &str, value: &[u8]) -> Result<u64, MehError> {
        let source_key = Self::entry_key(from, key);
        let to = to.to_string();
        let value = value.to_vec();
        let lock = self.append_lock.clone();

        self.blocking(move |db| {
            let _guard = lock.lock().map_err(|_| MehError::Storage("Queue append lock poisoned".to_string()))?;

            let mut batch = WriteBatch::default();
            let moved = Self::batch_append(db, &mut batch, &to, &value)?;
            batch.delete_cf(get_cf(db, CF_QUEUE)?, &source_key);
            db.write(batch).map_err(|e| MehError::Storage(format!("Failed to move queue entry: {}", e)))?;

            Ok(moved)
        })
        .await
    }
}

/// Factory for creating queue storage based on configuration
pub struct QueueStorageFactory;

impl QueueStorageFactory {
    pub fn create(store_type: QueueStorageType, path: Option<&Path>) -> Result<Arc<dyn QueueStorage>, MehError> {
        match store_type {
            QueueStorageType::InMemory => Ok(Arc::new(InMemoryQueueStorage::new())),
            QueueStorageType::RocksDb => {
                let path = path.ok_or(MehError::Configuration("A storage path is required for RocksDB".to_string()))?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Ok(Arc::new(RocksDbQueueStorage::open(path)?))
            }
        }
    }

    /// Like [`QueueStorageFactory::create`], but an unusable store yields
    /// `None` so that queues degrade to no-ops instead of failing.
    pub fn create_or_disable(store_type: QueueStorageType, path: Option<&Path>) -> Option<Arc<dyn QueueStorage>> {
        match Self::create(store_type, path) {
            Ok(storage) => Some(storage),
            Err(e) => {
                event!(Level::WARN, event = offline_queue::STORAGE_UNAVAILABLE,
                       backend = store_type.as_str(), error = %e);
                None
            }
        }
    }
}
