//! Expiry envelope around stored lock flags
//!
//! Every value is persisted as `{"expiresAt": <epoch ms>, "value": <identity>}`.
//! A record is only treated as gone once a full timeout window has elapsed
//! *past* its `expiresAt`, i.e. roughly twice the timeout after it was written.
//! Records inside that extra window are still returned.

use std::sync::Arc;

use async_trait::async_trait;
use fastmutex_common::{Clock, StoreError, SystemClock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{KeyValueStore, RecordStore};

/// Persisted shape of an X or Y flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    /// Absolute expiry in Unix milliseconds
    pub expires_at: i64,
    /// Client identity that wrote the flag
    pub value: String,
}

/// Timeouts beyond `i64::MAX` milliseconds saturate
fn window_millis(timeout_ms: u64) -> i64 {
    i64::try_from(timeout_ms).unwrap_or(i64::MAX)
}

impl StoredRecord {
    pub fn new(value: impl Into<String>, now: i64, timeout_ms: u64) -> Self {
        Self {
            expires_at: now.saturating_add(window_millis(timeout_ms)),
            value: value.into(),
        }
    }

    /// Whether a full `timeout_ms` window has passed since `expires_at`
    pub fn is_stale(&self, now: i64, timeout_ms: u64) -> bool {
        now.saturating_sub(self.expires_at) >= window_millis(timeout_ms)
    }
}

/// `RecordStore` over any `KeyValueStore`
pub struct ExpiringRecordStore<S> {
    inner: S,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> ExpiringRecordStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_clock(inner, Arc::new(SystemClock))
    }

    pub fn with_clock(inner: S, clock: Arc<dyn Clock>) -> Self {
        Self { inner, clock }
    }

    /// The raw store underneath the envelope
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: KeyValueStore> RecordStore for ExpiringRecordStore<S> {
    async fn put(&self, key: &str, identity: &str, timeout_ms: u64) -> Result<(), StoreError> {
        let record = StoredRecord::new(identity, self.clock.now_millis(), timeout_ms);
        let encoded =
            serde_json::to_string(&record).map_err(|e| StoreError::serialization(key, e))?;
        self.inner.set_item(key, &encoded).await
    }

    async fn get(&self, key: &str, timeout_ms: u64) -> Result<Option<String>, StoreError> {
        let raw = match self.inner.get_item(key).await? {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };

        let record: StoredRecord =
            serde_json::from_str(&raw).map_err(|e| StoreError::serialization(key, e))?;

        if record.is_stale(self.clock.now_millis(), timeout_ms) {
            debug!(%key, expires_at = record.expires_at, "Removed an expired record");
            self.inner.remove_item(key).await?;
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove_item(key).await
    }
}
