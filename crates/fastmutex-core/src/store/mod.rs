//! Storage layer
//!
//! Two capability traits:
//! - `KeyValueStore`: a plain string map with get/set/remove, no atomicity
//! - `RecordStore`: the timeout-aware envelope the lock coordinator talks to
//!
//! `ExpiringRecordStore` implements `RecordStore` on top of any `KeyValueStore`.

mod file;
mod memory;
mod record;

use std::sync::Arc;

use async_trait::async_trait;
use fastmutex_common::StoreError;

pub use file::{FileKeyValueStore, default_store_dir};
pub use memory::MemoryKeyValueStore;
pub use record::{ExpiringRecordStore, StoredRecord};

/// Generic string-keyed persistent map shared by all contenders
///
/// No compare-and-swap and no ordering guarantee: last writer wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing an absent key is a no-op
    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// All keys currently stored that start with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove_item(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).keys_with_prefix(prefix).await
    }
}

/// Timeout-aware record envelope used by the lock coordinator
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store `identity` under `key`, expiring `timeout_ms` from now
    async fn put(&self, key: &str, identity: &str, timeout_ms: u64) -> Result<(), StoreError>;

    /// Read the identity under `key`
    ///
    /// Returns `None` when nothing is stored, or when the record is older than
    /// its expiry by at least `timeout_ms` (the stale record is removed).
    async fn get(&self, key: &str, timeout_ms: u64) -> Result<Option<String>, StoreError>;

    /// Delete the record under `key`; absent keys are ignored
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
