use async_trait::async_trait;

use crate::domain::error::MehError;

/// One durably stored queue entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Auto-incremented insertion key, unique and increasing within a namespace
    pub key:   u64,
    pub value: Vec<u8>
}

/// Port for the durable local queue store
///
/// Namespaces are independent ordered collections. Keys handed out by
/// [`QueueStorage::append`] are strictly increasing within a namespace and are
/// never reused, even after deletes.
#[async_trait]
pub trait QueueStorage: Send + Sync {
    /// Create the namespace if it does not exist yet
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), MehError>;

    /// Append a value and return its insertion key
    async fn append(&self, namespace: &str, value: &[u8]) -> Result<u64, MehError>;

    /// Number of entries currently stored in the namespace
    async fn count(&self, namespace: &str) -> Result<usize, MehError>;

    /// Read every entry of the namespace in insertion order
    async fn scan(&self, namespace: &str) -> Result<Vec<StoredEntry>, MehError>;

    /// Overwrite the value of an existing entry, keeping its key
    async fn replace(&self, namespace: &str, key: u64, value: &[u8]) -> Result<(), MehError>;

    /// Delete one entry; deleting a missing key is not an error
    async fn delete(&self, namespace: &str, key: u64) -> Result<(), MehError>;

    /// Append `value` to `to` and delete `key` from `from` in one atomic write
    ///
    /// Returns the key of the appended entry.
    async fn move_entry(&self, from: &str, key: u64, to: &str, value: &[u8]) -> Result<u64, MehError>;
}
