//! Contention harness
//!
//! Contenders share one raw key/value store: the lock flags go through the
//! expiring record layer, the counter and participant markers are plain values
//! next to them.

mod race;
mod report;
mod run;

use std::sync::Arc;

use fastmutex_common::StoreError;
use fastmutex_core::{
    ExpiringRecordStore, FastMutex, FastMutexBuilder, FastMutexConfig, FileKeyValueStore,
    KeyValueStore, MemoryKeyValueStore, RecordStore,
};
use tracing::info;

use crate::config::{StoreConfig, StoreKind};

pub use race::run_race;
pub use report::{ContenderReport, RaceReport, RunReport, format_timestamp};
pub use run::{next_run_start, run_participant};

/// Raw store plus the record view the lock coordinator uses
#[derive(Clone)]
pub struct SharedStore {
    pub raw: Arc<dyn KeyValueStore>,
    pub records: Arc<dyn RecordStore>,
}

impl SharedStore {
    pub fn new(raw: Arc<dyn KeyValueStore>) -> Self {
        let records: Arc<dyn RecordStore> = Arc::new(ExpiringRecordStore::new(raw.clone()));
        Self { raw, records }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    /// A coordinator over this store
    ///
    /// Each call gets its own identity unless the configuration fixes one.
    pub fn mutex(&self, config: &FastMutexConfig) -> FastMutex {
        FastMutexBuilder::from_config(config.clone())
            .store(self.records.clone())
            .build()
    }

    pub async fn read_counter(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self
            .raw
            .get_item(key)
            .await?
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0))
    }

    pub async fn write_counter(&self, key: &str, value: u64) -> Result<(), StoreError> {
        self.raw.set_item(key, &value.to_string()).await
    }
}

/// Open the configured backing store
pub fn open_store(config: &StoreConfig) -> SharedStore {
    match config.kind {
        StoreKind::Memory => {
            info!("Using in-memory store");
            SharedStore::memory()
        }
        StoreKind::File => {
            info!(dir = %config.dir.display(), "Using file store");
            SharedStore::new(Arc::new(FileKeyValueStore::new(config.dir.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter_defaults_to_zero() {
        let store = SharedStore::memory();
        assert_eq!(store.read_counter("missing").await.unwrap(), 0);

        store.raw.set_item("garbage", "not a number").await.unwrap();
        assert_eq!(store.read_counter("garbage").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_counter_round_trip() {
        let store = SharedStore::memory();
        store.write_counter("c", 41).await.unwrap();
        assert_eq!(store.read_counter("c").await.unwrap(), 41);
        assert_eq!(store.raw.get_item("c").await.unwrap().as_deref(), Some("41"));
    }

    #[tokio::test]
    async fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&StoreConfig {
            kind: StoreKind::File,
            dir: dir.path().to_path_buf(),
        });
        store.write_counter("c", 3).await.unwrap();
        assert_eq!(store.read_counter("c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_mutex_uses_shared_records() {
        let store = SharedStore::memory();
        let config = FastMutexConfig::default();

        let mut mutex = store.mutex(&config);
        mutex.lock("k").await.unwrap();
        let y = store.records.get("_MUTEX_LOCK_Y_k", 5000).await.unwrap();
        assert_eq!(y.as_deref(), Some(mutex.client_id()));
        mutex.release("k").await.unwrap();
    }
}
