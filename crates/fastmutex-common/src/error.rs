//! Error types for fastmutex
//!
//! This module defines:
//! - `FastMutexError`: failures that cross the coordinator boundary
//! - `StoreError`: failures raised by a key/value backend or the record envelope
//!
//! Contention, restarts and lost races are not errors. They are recorded in the
//! lock statistics and handled by retrying.

/// Failures raised by the underlying key/value store
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record under key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            key: key.into(),
            source,
        }
    }

    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        StoreError::Serialization {
            key: key.into(),
            source,
        }
    }

    /// The storage key the failing operation targeted
    pub fn key(&self) -> &str {
        match self {
            StoreError::Io { key, .. } | StoreError::Serialization { key, .. } => key,
        }
    }
}

/// Lock coordinator errors
#[derive(thiserror::Error, Debug)]
pub enum FastMutexError {
    #[error("Lock could not be acquired within {timeout_ms}ms")]
    AcquisitionTimeout { key: String, timeout_ms: u64 },

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl FastMutexError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FastMutexError::AcquisitionTimeout { .. })
    }
}

pub type Result<T, E = FastMutexError> = std::result::Result<T, E>;
