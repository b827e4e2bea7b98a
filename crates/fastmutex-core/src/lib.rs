//! fastmutex Core - Mutual exclusion over an eventually-visible key/value store
//!
//! This crate provides:
//! - Raw key/value backends (in-memory and directory-backed)
//! - The expiring record store the lock protocol reads and writes
//! - The fast mutex coordinator with per-acquisition statistics
//! - Lock metrics emitted through the `metrics` facade

pub mod config;
pub mod lock;
pub mod metrics;
pub mod store;

pub use config::FastMutexConfig;
pub use lock::{AcquireStep, FastMutex, FastMutexBuilder, LockStats};
pub use store::{
    ExpiringRecordStore, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, RecordStore,
    StoredRecord, default_store_dir,
};

// Re-export the error taxonomy so callers need a single dependency
pub use fastmutex_common::{FastMutexError, StoreError};
